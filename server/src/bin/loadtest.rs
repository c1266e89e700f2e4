//! Load test for the relay server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server and wait for their assigned id
//! - Periodically send position updates
//! - Receive and count snapshot broadcasts and disconnect notices
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 100)
//!   --duration S     Test duration in seconds (default: 30)
//!   --update-rate R  Position updates per second per client (default: 10)
//!   --url URL        Server URL (default: ws://127.0.0.1:8080/ws)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use relay_shared::protocol::{ClientMsg, ServerMsg, TransformUpdate};
use relay_shared::vec3::Vec3;
use tokio_tungstenite::{connect_async, tungstenite::Message};

// === Metrics ===

struct Metrics {
    connected: AtomicU64,
    messages_received: AtomicU64,
    snapshots_received: AtomicU64,
    disconnects_received: AtomicU64,
    updates_sent: AtomicU64,
    errors: AtomicU64,
    total_peers_seen: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            snapshots_received: AtomicU64::new(0),
            disconnects_received: AtomicU64::new(0),
            updates_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_peers_seen: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    update_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let ws_result = connect_async(&url).await;
    let (mut ws, _) = match ws_result {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let connect_latency = connect_start.elapsed();
    metrics
        .latency_sum_ms
        .fetch_add(connect_latency.as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    // Wait for the identity message before doing anything else
    let identity = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    if let Ok(ServerMsg::Uuid(id)) = serde_json::from_str::<ServerMsg>(&text) {
                        return Some(id);
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await;

    let own_id = match identity {
        Ok(Some(id)) => id,
        _ => {
            if client_id < 3 {
                eprintln!("Client {} never got its id", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    };

    let name = ClientMsg::Name(format!("load-{}", client_id));
    if ws
        .send(Message::Text(serde_json::to_string(&name).unwrap().into()))
        .await
        .is_err()
    {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    let update_interval = if update_rate > 0.0 {
        Duration::from_secs_f64(1.0 / update_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };

    let mut update_timer = tokio::time::interval(update_interval);
    update_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut rng_state: u64 = client_id as u64 * 12345 + 67890;
    let mut tick: f64 = 0.0;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = update_timer.tick() => {
                // Simple LCG wander so every client walks a different path
                rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
                let jitter = ((rng_state >> 32) as f64 / u32::MAX as f64) * 2.0 - 1.0;
                tick += 0.1;

                let update = TransformUpdate {
                    position: Some(Vec3::new(
                        (client_id as f64) * 10.0 + tick.sin() * 5.0,
                        0.0,
                        (client_id as f64) * 10.0 + tick.cos() * 5.0 + jitter,
                    )),
                    linear_velocity: Some(Vec3::new(jitter, 0.0, -jitter)),
                    ..Default::default()
                };
                let msg = ClientMsg::Position(update);
                let json = serde_json::to_string(&msg).unwrap();
                if ws.send(Message::Text(json.into())).await.is_ok() {
                    metrics.updates_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        if let Ok(server_msg) = serde_json::from_str::<ServerMsg>(&text) {
                            match server_msg {
                                ServerMsg::Position(snapshot) => {
                                    metrics.snapshots_received.fetch_add(1, Ordering::Relaxed);
                                    metrics.total_peers_seen.fetch_add(snapshot.len() as u64, Ordering::Relaxed);
                                    if !snapshot.contains_key(&own_id) && client_id < 3 {
                                        eprintln!("Client {} missing from its own snapshot", client_id);
                                    }
                                }
                                ServerMsg::Disconnect(_) => {
                                    metrics.disconnects_received.fetch_add(1, Ordering::Relaxed);
                                }
                                ServerMsg::Uuid(_) => {}
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 100;
    let mut duration_secs: u64 = 30;
    let mut update_rate: f64 = 10.0;
    let mut url = "ws://127.0.0.1:8080/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(100);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--update-rate" => {
                i += 1;
                update_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(10.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Relay Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Update rate: {}/s per client", update_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::new());
    let duration = Duration::from_secs(duration_secs);

    // Spawn all clients
    let mut handles = Vec::with_capacity(num_clients as usize);

    println!("Spawning {} clients...", num_clients);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, update_rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            let connected = metrics_clone.connected.load(Ordering::Relaxed);
            let msgs = metrics_clone.messages_received.load(Ordering::Relaxed);
            let snapshots = metrics_clone.snapshots_received.load(Ordering::Relaxed);
            let disconnects = metrics_clone.disconnects_received.load(Ordering::Relaxed);
            let updates = metrics_clone.updates_sent.load(Ordering::Relaxed);
            let errors = metrics_clone.errors.load(Ordering::Relaxed);
            let peers = metrics_clone.total_peers_seen.load(Ordering::Relaxed);
            let avg_peers = if snapshots > 0 { peers / snapshots } else { 0 };

            println!(
                "[{:3}s] connected={}, msgs={}, snapshots={}, disconnects={}, updates={}, errors={}, avg_peers={}",
                elapsed, connected, msgs, snapshots, disconnects, updates, errors, avg_peers
            );
        }
    });

    // Wait for all clients to finish
    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    // Final stats
    println!();
    println!("=== Final Results ===");
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let snapshots = metrics.snapshots_received.load(Ordering::Relaxed);
    let disconnects = metrics.disconnects_received.load(Ordering::Relaxed);
    let updates = metrics.updates_sent.load(Ordering::Relaxed);
    let errors = metrics.errors.load(Ordering::Relaxed);
    let peers = metrics.total_peers_seen.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total messages received: {}", msgs);
    println!("Total snapshots: {}", snapshots);
    println!("Total disconnect notices: {}", disconnects);
    println!("Total position updates sent: {}", updates);
    println!("Total errors: {}", errors);
    println!(
        "Average peers per snapshot: {}",
        if snapshots > 0 { peers / snapshots } else { 0 }
    );

    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    let msgs_per_sec = msgs as f64 / duration_secs as f64;
    let snapshots_per_client = snapshots as f64 / num_clients as f64;
    let expected_per_client = duration_secs as f64 * 30.0; // 30 Hz broadcast

    println!();
    println!("Messages/sec (total): {:.0}", msgs_per_sec);
    println!("Snapshots per client: {:.1}", snapshots_per_client);
    println!("Expected snapshots per client: {:.1}", expected_per_client);

    let delivery_rate = snapshots_per_client / expected_per_client * 100.0;
    println!("Delivery rate: {:.1}%", delivery_rate);
}
