//! Tests for the full validation pipeline.

use super::*;

#[test]
fn default_config_validates() {
    let config = HuddleConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_non_websocket_relay_url() {
    let mut config = HuddleConfig::default();
    config.relay.url = "https://relay.example.org".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.url"));
}

#[test]
fn accepts_secure_relay_url() {
    let mut config = HuddleConfig::default();
    config.relay.url = "wss://relay.example.org/ws".into();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_zero_connect_timeout() {
    let mut config = HuddleConfig::default();
    config.relay.connect_timeout_secs = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.connect_timeout_secs"));
}

#[test]
fn catches_zero_password_length() {
    let mut config = HuddleConfig::default();
    config.room.min_password_length = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("room.min_password_length"));
}

#[test]
fn catches_tiny_event_buffer() {
    let mut config = HuddleConfig::default();
    config.room.event_buffer = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("room.event_buffer"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = HuddleConfig::default();
    config.relay.connect_timeout_secs = 600;
    config.room.min_password_length = 100;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.connect_timeout_secs"));
    assert!(err.contains("room.min_password_length"));
    assert!(err.contains("; "));
}
