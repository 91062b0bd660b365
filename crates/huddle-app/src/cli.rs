use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Huddle: password-gated peer-to-peer meeting rooms.
#[derive(Parser, Debug)]
#[command(name = "huddle", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Relay URL override, e.g. ws://127.0.0.1:9000.
    #[arg(long, global = true)]
    pub relay: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a new meeting and wait for others to join.
    Create {
        /// Your display name.
        #[arg(short, long)]
        name: String,

        /// Password joiners must present.
        #[arg(short, long)]
        password: String,

        /// Use this meeting id instead of a generated one.
        #[arg(long)]
        room_id: Option<String>,
    },
    /// Join an existing meeting.
    Join {
        /// Meeting id shared by the creator.
        #[arg(short, long)]
        room: String,

        /// Your display name.
        #[arg(short, long)]
        name: String,

        /// Meeting password.
        #[arg(short, long)]
        password: String,
    },
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_with_globals() {
        let args = Args::try_parse_from([
            "huddle",
            "--relay",
            "ws://relay:9000",
            "create",
            "--name",
            "Alice",
            "--password",
            "pass",
        ])
        .unwrap();
        assert_eq!(args.relay.as_deref(), Some("ws://relay:9000"));
        assert_eq!(
            args.command,
            Command::Create {
                name: "Alice".into(),
                password: "pass".into(),
                room_id: None,
            }
        );
    }

    #[test]
    fn parses_join() {
        let args = Args::try_parse_from([
            "huddle", "join", "-r", "r1-ab12cd", "-n", "Bob", "-p", "pass", "--log-level", "debug",
        ])
        .unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(
            args.command,
            Command::Join {
                room: "r1-ab12cd".into(),
                name: "Bob".into(),
                password: "pass".into(),
            }
        );
    }

    #[test]
    fn join_requires_room() {
        assert!(Args::try_parse_from(["huddle", "join", "-n", "Bob", "-p", "pass"]).is_err());
    }
}
