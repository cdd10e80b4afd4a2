//! Event file loading and replay.
//!
//! An event file is a YAML list, replayed in order:
//!
//! ```yaml
//! - op: apply
//!   app:
//!     metadata: { name: web, namespace: prod }
//! - op: delete
//!   app:
//!     metadata: { name: web, namespace: prod }
//! ```

use std::time::Duration;

use anyhow::Context;
use appsync::{AppSynchronizer, SyncContext};
use catalog::Application;
use serde::Deserialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What the watcher observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOp {
    /// Create or update
    Apply,
    Delete,
}

impl EventOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Delete => "delete",
        }
    }
}

/// One recorded event.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEvent {
    pub op: EventOp,
    pub app: Application,
}

/// Counts of what happened during a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub deleted: usize,
    /// Deletes of applications that were never synced
    pub unknown_deletes: usize,
    pub failed: usize,
}

/// Parse an event file.
pub fn parse_events(yaml: &str) -> anyhow::Result<Vec<ReplayEvent>> {
    serde_yaml::from_str(yaml).context("Failed to parse event file")
}

/// Replay `events` in order. Failed events are logged and counted; the
/// replay carries on with the next one, as a watcher would.
pub async fn replay(
    sync: &AppSynchronizer,
    events: &[ReplayEvent],
    timeout: Duration,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for event in events {
        let span = info_span!(
            "event",
            id = %Uuid::new_v4(),
            op = event.op.as_str(),
            app = event.app.name(),
            namespace = event.app.namespace(),
        );
        let ctx = SyncContext::background().with_timeout(timeout);

        let result = async {
            match event.op {
                EventOp::Apply => sync.add_or_update(&ctx, &event.app).await,
                EventOp::Delete => sync.delete_app(&ctx, &event.app).await,
            }
        }
        .instrument(span.clone())
        .await;

        let _enter = span.enter();
        match (event.op, result) {
            (EventOp::Apply, Ok(())) => summary.applied += 1,
            (EventOp::Delete, Ok(())) => summary.deleted += 1,
            (EventOp::Delete, Err(e)) if e.is_not_found() => {
                warn!("Delete of unknown application ignored");
                summary.unknown_deletes += 1;
            }
            (_, Err(e)) => {
                error!(error = %e, "Event failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        applied = summary.applied,
        deleted = summary.deleted,
        unknown_deletes = summary.unknown_deletes,
        failed = summary.failed,
        "Replay finished"
    );
    summary
}
