//! AppSync Replay - feed recorded Application events through the synchronizer
//!
//! Stands in for the cluster watcher: reads apply/delete events from a YAML
//! file, reconciles them into an in-memory catalog and prints the result.

mod args;
mod events;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appsync::services::StoreServices;
use appsync::{AppSynchronizer, RevisionCache, SyncConfig};
use catalog::MemoryStore;

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr so stdout carries only the catalog
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("appsync={lvl},appsync_replay={lvl},warn", lvl = log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            SyncConfig::from_yaml(&yaml)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => SyncConfig::default(),
    };

    let yaml = std::fs::read_to_string(&args.events)
        .with_context(|| format!("Failed to read events {}", args.events.display()))?;
    let events = events::parse_events(&yaml)?;

    info!(
        events = events.len(),
        project = %config.default_project,
        cluster = %config.default_cluster,
        "Starting replay"
    );

    let store = Arc::new(MemoryStore::new());
    let timeout = config.event_timeout();
    let sync = AppSynchronizer::new(store.clone(), Arc::new(RevisionCache::new()))
        .with_config(config)
        .with_application_service(Arc::new(StoreServices::new(store.clone())));

    let summary = events::replay(&sync, &events, timeout).await;

    let snapshot = store.snapshot();
    let output = if args.pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{}", output);

    if summary.failed > 0 {
        anyhow::bail!("{} event(s) failed", summary.failed);
    }
    Ok(())
}
