//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[relay]
url = "ws://127.0.0.1:9000"
# connect_timeout_secs = 15   # 1-60

[room]
# min_password_length = 4     # 1-64
# event_buffer = 256          # 16-4096

[media]
# camera = true
# microphone = true
# deny_camera = false
# start_video_muted = false
# start_audio_muted = false
# screen_capture = true

[logging]
# level = "INFO"              # TRACE, DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
