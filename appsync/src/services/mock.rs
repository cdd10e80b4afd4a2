//! Mock collaborator services for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use catalog::{Application, ApplicationRecord};

use super::traits::*;
use crate::context::SyncContext;
use crate::error::ServiceError;

/// A recorded `sync_workflow_record` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSyncCall {
    pub app_key: String,
    pub record_name: String,
    /// `namespace/name` of the live resource
    pub resource: String,
}

/// Workflow service that records calls.
pub struct MockWorkflowService {
    available: AtomicBool,
    calls: Mutex<Vec<WorkflowSyncCall>>,
}

impl MockWorkflowService {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set availability. Unavailable services fail every call.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<WorkflowSyncCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for MockWorkflowService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowService for MockWorkflowService {
    async fn sync_workflow_record(
        &self,
        _ctx: &SyncContext,
        app_key: &str,
        record_name: &str,
        app: &Application,
        _extra: Option<&serde_json::Value>,
    ) -> Result<(), ServiceError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable(
                "Mock workflow service disabled".to_string(),
            ));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(WorkflowSyncCall {
                app_key: app_key.to_string(),
                record_name: record_name.to_string(),
                resource: format!("{}/{}", app.namespace(), app.name()),
            });
        }
        Ok(())
    }
}

/// Application service that records deletions without touching any store.
pub struct MockApplicationService {
    deleted: Mutex<Vec<String>>,
}

impl MockApplicationService {
    pub fn new() -> Self {
        Self {
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Keys of the records passed to `delete_application`.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Default for MockApplicationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApplicationService for MockApplicationService {
    async fn delete_application(
        &self,
        _ctx: &SyncContext,
        record: &ApplicationRecord,
    ) -> Result<(), ServiceError> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(record.name.clone());
        }
        Ok(())
    }
}
