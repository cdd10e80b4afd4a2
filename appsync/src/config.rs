//! Configuration for the synchronizer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`AppSynchronizer`](crate::AppSynchronizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Project that CLI-origin applications join
    pub default_project: String,
    /// Cluster used for the implicit target when no topology is declared
    pub default_cluster: String,
    /// Prefix of generated environment names
    pub env_name_prefix: String,
    /// Report "metadata sync not due" when the cached revision is unchanged
    pub skip_unchanged_revisions: bool,
    /// Deadline hosts apply to a single event (ms)
    pub event_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_project: "default".to_string(),
            default_cluster: "local".to_string(),
            env_name_prefix: "syncd-".to_string(),
            skip_unchanged_revisions: false,
            event_timeout_ms: 30_000,
        }
    }
}

impl SyncConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Per-event deadline.
    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }

    /// Environment name generated for a namespace.
    pub fn env_name(&self, namespace: &str) -> String {
        format!("{}{}", self.env_name_prefix, namespace)
    }

    /// Name of the implicit target for a namespace.
    pub fn default_target_name(&self, namespace: &str) -> String {
        format!("{}-{}", self.default_cluster, namespace)
    }
}
