//! Command line arguments for the replay harness.

use std::path::PathBuf;

use clap::Parser;

/// Replays recorded Application events through the synchronizer
#[derive(Parser, Debug, Clone)]
#[command(name = "appsync-replay")]
#[command(about = "Replay Application events into an in-memory VelaUX catalog")]
pub struct Args {
    /// YAML file with the events to replay, in delivery order
    #[arg(long, env = "APPSYNC_EVENTS")]
    pub events: PathBuf,

    /// Synchronizer config (YAML). Defaults apply when omitted
    #[arg(long, env = "APPSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Pretty-print the resulting catalog
    #[arg(long, env = "APPSYNC_PRETTY", default_value = "false")]
    pub pretty: bool,
}
