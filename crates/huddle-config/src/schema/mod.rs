//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod media;
mod relay;
mod room;
mod system;

pub use media::*;
pub use relay::*;
pub use room::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for a Huddle participant.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub relay: RelayConfig,
    pub room: RoomConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}
