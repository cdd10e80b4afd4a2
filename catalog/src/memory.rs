//! In-memory datastore.
//!
//! Backs tests and the replay harness. Keeps a journal of every mutation
//! so callers can assert write order, and can be told to fail a given
//! operation on a given entity kind.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use crate::datastore::DataStore;
use crate::error::{Result, StoreError};

/// Datastore operation, used for the journal and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
    List,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }
}

/// A journaled mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub op: StoreOp,
    pub kind: String,
    pub key: String,
}

/// Thread-safe in-memory datastore.
pub struct MemoryStore {
    /// Records by kind, then key
    tables: DashMap<String, BTreeMap<String, serde_json::Value>>,
    /// Mutations in the order they were applied
    journal: Mutex<Vec<JournalEntry>>,
    /// Injected failures
    failures: DashMap<(StoreOp, String), String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            failures: DashMap::new(),
        }
    }

    /// Make every `op` on `kind` fail with a backend error.
    pub fn fail_on(&self, op: StoreOp, kind: &str) {
        self.failures.insert(
            (op, kind.to_string()),
            format!("injected {} failure on {}", op.as_str(), kind),
        );
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Mutations applied so far.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal_guard().clone()
    }

    /// Kinds written by `put`, in order, with consecutive repeats collapsed.
    pub fn put_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = Vec::new();
        for entry in self.journal() {
            if entry.op == StoreOp::Put && kinds.last() != Some(&entry.kind) {
                kinds.push(entry.kind);
            }
        }
        kinds
    }

    /// Forget the journal.
    pub fn clear_journal(&self) {
        self.journal_guard().clear();
    }

    /// Copy of every record, by kind then key.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, serde_json::Value>> {
        self.tables
            .iter()
            .filter(|table| !table.value().is_empty())
            .map(|table| (table.key().clone(), table.value().clone()))
            .collect()
    }

    /// Number of records of a kind.
    pub fn count(&self, kind: &str) -> usize {
        self.tables.get(kind).map(|t| t.len()).unwrap_or(0)
    }

    fn check_failure(&self, op: StoreOp, kind: &str) -> Result<()> {
        match self.failures.get(&(op, kind.to_string())) {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }

    fn record(&self, op: StoreOp, kind: &str, key: &str) {
        trace!(op = op.as_str(), kind, key, "memory store mutation");
        self.journal_guard().push(JournalEntry {
            op,
            kind: kind.to_string(),
            key: key.to_string(),
        });
    }

    /// Journal lock, recovered if poisoned so no entry is ever dropped.
    fn journal_guard(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_raw(&self, kind: &str, key: &str) -> Result<serde_json::Value> {
        self.check_failure(StoreOp::Get, kind)?;
        self.tables
            .get(kind)
            .and_then(|table| table.get(key).cloned())
            .ok_or_else(|| StoreError::not_found(kind, key))
    }

    async fn put_raw(&self, kind: &str, key: &str, value: serde_json::Value) -> Result<()> {
        self.check_failure(StoreOp::Put, kind)?;
        self.tables
            .entry(kind.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.record(StoreOp::Put, kind, key);
        Ok(())
    }

    async fn delete_raw(&self, kind: &str, key: &str) -> Result<()> {
        self.check_failure(StoreOp::Delete, kind)?;
        let removed = self
            .tables
            .get_mut(kind)
            .and_then(|mut table| table.remove(key));
        match removed {
            Some(_) => {
                self.record(StoreOp::Delete, kind, key);
                Ok(())
            }
            None => Err(StoreError::not_found(kind, key)),
        }
    }

    async fn list_raw(&self, kind: &str) -> Result<Vec<serde_json::Value>> {
        self.check_failure(StoreOp::List, kind)?;
        Ok(self
            .tables
            .get(kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }
}
