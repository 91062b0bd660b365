use serde::{Deserialize, Serialize};

/// Connection settings for the signaling relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket URL of the relay server.
    pub url: String,
    /// Seconds to wait for the relay handshake (valid range: 1-60).
    pub connect_timeout_secs: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9000".into(),
            connect_timeout_secs: 15,
        }
    }
}
