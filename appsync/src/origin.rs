//! Origin classification.
//!
//! Decides, once per event, which path an application takes: the console
//! path (workflow status only), the CLI path (full metadata sync), or
//! neither. The predicate is pluggable; [`LabelClassifier`] reads the
//! source-of-truth label the console and CLI tooling stamp on resources.

use catalog::labels::{SourceOfTruth, LABEL_SOURCE_OF_TRUTH};
use catalog::Application;

use crate::cache::CachedRevision;

/// Where a live resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Created in the console; its data already lives in the catalog
    Console,
    /// Applied through the command line or a GitOps pipeline
    Cli,
    /// Outside the synchronizer's concern
    Unrecognized,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Cli => "cli",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Which entry point is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    AddOrUpdate,
    Delete,
}

/// Classifies live resources by origin.
pub trait OriginClassifier: Send + Sync {
    /// Classify a resource. Must be pure.
    fn classify(&self, app: &Application) -> Origin;

    /// Whether the full metadata pipeline is due for this event.
    ///
    /// `cached` is the revision cache entry for the resource's composed key.
    fn needs_metadata_sync(
        &self,
        app: &Application,
        event: SyncEvent,
        cached: Option<&CachedRevision>,
    ) -> bool;

    fn is_console_origin(&self, app: &Application) -> bool {
        self.classify(app) == Origin::Console
    }

    fn is_cli_origin(&self, app: &Application) -> bool {
        self.classify(app) == Origin::Cli
    }
}

/// Classifier driven by the source-of-truth label.
///
/// - `from-uxdb` → console
/// - `from-cli` or no label → CLI
/// - `from-inner-system` or any other value → unrecognized
#[derive(Debug, Clone, Default)]
pub struct LabelClassifier {
    skip_unchanged_revisions: bool,
}

impl LabelClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: treat an update whose revision matches the cache as a no-op.
    pub fn with_skip_unchanged_revisions(mut self, skip: bool) -> Self {
        self.skip_unchanged_revisions = skip;
        self
    }
}

impl OriginClassifier for LabelClassifier {
    fn classify(&self, app: &Application) -> Origin {
        match app.label(LABEL_SOURCE_OF_TRUTH).map(SourceOfTruth::parse) {
            None | Some(Some(SourceOfTruth::Cli)) => Origin::Cli,
            Some(Some(SourceOfTruth::Console)) => Origin::Console,
            Some(Some(SourceOfTruth::InnerSystem)) | Some(None) => Origin::Unrecognized,
        }
    }

    fn needs_metadata_sync(
        &self,
        app: &Application,
        event: SyncEvent,
        cached: Option<&CachedRevision>,
    ) -> bool {
        if self.classify(app) != Origin::Cli {
            return false;
        }
        if event == SyncEvent::Delete || !self.skip_unchanged_revisions {
            return true;
        }
        match (cached, app.synced_revision()) {
            (Some(cached), Some(revision)) => cached.revision != revision,
            _ => true,
        }
    }
}
