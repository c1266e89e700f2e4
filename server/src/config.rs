use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Snapshot pushes per second, per connection
    pub broadcast_rate_hz: u32,
    pub max_connections: usize,
    /// WebSocket frame size cap; oversized frames are a protocol error
    pub max_message_bytes: usize,
    pub max_name_len: usize,
    /// Depth of the disconnect-event broadcast channel
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            broadcast_rate_hz: 30,
            max_connections: 256,
            max_message_bytes: 4096,
            max_name_len: 64,
            event_capacity: 256,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.broadcast_rate_hz == 0 {
            return Err("broadcast_rate_hz must be >= 1".to_string());
        }
        if self.broadcast_rate_hz > 1000 {
            return Err("broadcast_rate_hz must be <= 1000".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be >= 1".to_string());
        }
        if self.max_message_bytes < 64 {
            return Err("max_message_bytes must be >= 64".to_string());
        }
        if self.max_name_len == 0 {
            return Err("max_name_len must be >= 1".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be >= 1".to_string());
        }
        Ok(())
    }

    /// Interval between snapshot pushes to a single connection.
    pub fn broadcast_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.broadcast_rate_hz as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_broadcast_rate_invalid() {
        let mut config = ServerConfig::default();
        config.broadcast_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_connections_invalid() {
        let mut config = ServerConfig::default();
        config.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_period_is_thirty_hz() {
        let period = ServerConfig::default().broadcast_period();
        assert!((period.as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
    }
}
