use axum::routing::get;
use axum::Router;
use relay_server::config::ServerConfig;
use relay_server::ws::{ws_handler, AppState};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut config = ServerConfig::default();
    // Optional listen address: `relay-server 0.0.0.0:9000`
    if let Some(addr) = std::env::args().nth(1) {
        config.listen_addr = addr;
    }

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    let app_state = AppState::new(&config);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Starting relay server on {}", listen_addr);
    println!("Relay server listening on {}", listen_addr);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
