//! huddle-relay: WebSocket signaling relay for huddle rooms.

use clap::Parser;
use tokio::net::TcpListener;

use huddle_relay::{serve, PeerRegistry};

#[derive(Parser)]
#[command(name = "huddle-relay", about = "WebSocket signaling relay for huddle rooms")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 9000)]
    port: u16,

    /// Log filter, e.g. `info` or `huddle_relay=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "huddle_relay=info".into()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    tracing::info!("huddle-relay listening on {}", addr);
    serve(listener, PeerRegistry::new()).await;
}
