//! Well-known annotation and label keys.
//!
//! Annotations come from the live `Application` resource; labels are
//! written onto persisted application records by the synchronizer.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Annotation carrying the catalog primary key of the application.
pub const ANNOTATION_APP_NAME: &str = "app.oam.dev/appName";

/// Annotation naming the rollout the resource currently represents.
pub const ANNOTATION_PUBLISH_VERSION: &str = "app.oam.dev/publishVersion";

/// Namespace that currently owns the bare application name.
pub const LABEL_SYNC_NAMESPACE: &str = "ux.oam.dev/synced-namespace";

/// Which side owns the application data.
pub const LABEL_SOURCE_OF_TRUTH: &str = "ux.oam.dev/source-of-truth";

/// Revision last written by a full sync.
pub const LABEL_SYNC_REVISION: &str = "ux.oam.dev/synced-revision";

/// Origin recorded in the source-of-truth label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum SourceOfTruth {
    /// Applied through the command line or a GitOps pipeline
    #[serde(rename = "from-cli")]
    Cli,
    /// Created in the console and stored there first
    #[serde(rename = "from-uxdb")]
    Console,
    /// Managed by an internal system, never synced
    #[serde(rename = "from-inner-system")]
    InnerSystem,
}

impl SourceOfTruth {
    /// Label value for this origin.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "from-cli",
            Self::Console => "from-uxdb",
            Self::InnerSystem => "from-inner-system",
        }
    }

    /// Parse a label value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "from-cli" => Some(Self::Cli),
            "from-uxdb" => Some(Self::Console),
            "from-inner-system" => Some(Self::InnerSystem),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceOfTruth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
