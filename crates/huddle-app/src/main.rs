mod cli;
mod room;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use huddle_config::HuddleConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Load config before logging so its level can apply; report failures
    // once the subscriber is up.
    let loaded = match &args.config {
        Some(path) => huddle_config::load_config_from(path),
        None => huddle_config::load_config(),
    };
    let (mut config, load_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (HuddleConfig::default(), Some(e)),
    };

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_directive())),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Huddle v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(e) = load_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }
    if let Some(url) = args.relay {
        config.relay.url = url;
    }
    tracing::info!(relay = %config.relay.url, "Config loaded");

    match room::run(args.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
