//! Full configuration validation.
//!
//! Each section has its own check; this orchestrator runs them all and
//! collects errors into a single `ConfigError`.

mod helpers;

#[cfg(test)]
mod tests;

use crate::schema::HuddleConfig;
use huddle_common::ConfigError;

use helpers::validate_range;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &HuddleConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_relay(&mut errors, config);
    validate_room(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_relay(errors: &mut Vec<String>, config: &HuddleConfig) {
    let url = config.relay.url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(format!(
            "relay.url = {url:?} must start with ws:// or wss://"
        ));
    }
    validate_range(
        errors,
        "relay.connect_timeout_secs",
        config.relay.connect_timeout_secs,
        1,
        60,
    );
}

fn validate_room(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(
        errors,
        "room.min_password_length",
        config.room.min_password_length,
        1,
        64,
    );
    validate_range(
        errors,
        "room.event_buffer",
        config.room.event_buffer,
        16,
        4096,
    );
}
