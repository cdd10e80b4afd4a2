//! Revision cache.
//!
//! Maps the composed `name-namespace` key of an application to the
//! revision and target count written by its last successful full sync.
//! Not authoritative: it can always be rebuilt from the datastore.
//! Concurrent writers to the same key resolve last-write-wins; entries
//! are overwritten on every successful sync and never expired.

use dashmap::DashMap;
use tracing::trace;

/// Composed key for an application identity.
pub fn composed_name(name: &str, namespace: &str) -> String {
    format!("{}-{}", name, namespace)
}

/// What the last successful sync recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRevision {
    /// Synced revision identifier
    pub revision: String,
    /// Number of targets written
    pub target_count: i64,
}

/// Thread-safe revision cache, injected into the synchronizer.
#[derive(Debug, Default)]
pub struct RevisionCache {
    entries: DashMap<String, CachedRevision>,
}

impl RevisionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record a sync result, replacing any previous entry for `key`.
    pub fn put(&self, key: impl Into<String>, revision: impl Into<String>, target_count: i64) {
        let key = key.into();
        let entry = CachedRevision {
            revision: revision.into(),
            target_count,
        };
        trace!(key = %key, revision = %entry.revision, target_count, "revision cache put");
        self.entries.insert(key, entry);
    }

    /// Look up the last recorded sync for `key`.
    pub fn get(&self, key: &str) -> Option<CachedRevision> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Number of cached applications.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
