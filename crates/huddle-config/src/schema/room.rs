//! Room creation and membership settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Minimum meeting password length (valid range: 1-64).
    pub min_password_length: u32,
    /// Capacity of each coordinator event channel (valid range: 16-4096).
    pub event_buffer: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_password_length: 4,
            event_buffer: 256,
        }
    }
}
