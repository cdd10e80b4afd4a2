//! Collaborator service traits.
//!
//! The synchronizer treats these as black boxes. Each write is an
//! idempotent upsert keyed by the entity's identity, so redelivered events
//! can replay them safely.

use async_trait::async_trait;

use catalog::{Application, ApplicationRecord, Environment, Project, Target};

use crate::context::SyncContext;
use crate::error::ServiceError;

/// Creates projects on demand.
#[async_trait]
pub trait ProjectService: Send + Sync {
    /// Create the project unless it already exists.
    async fn ensure_project(&self, ctx: &SyncContext, project: &Project)
        -> Result<(), ServiceError>;
}

/// Manages deployment targets.
#[async_trait]
pub trait TargetService: Send + Sync {
    /// Create or update a target.
    async fn ensure_target(&self, ctx: &SyncContext, target: &Target) -> Result<(), ServiceError>;
}

/// Manages environments.
#[async_trait]
pub trait EnvService: Send + Sync {
    /// Create an environment, or merge targets into an existing one.
    async fn upsert_env(&self, ctx: &SyncContext, env: &Environment) -> Result<(), ServiceError>;
}

/// Reflects workflow execution status into the catalog.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Sync the workflow record `record_name` of application `app_key`
    /// from the live resource's status.
    async fn sync_workflow_record(
        &self,
        ctx: &SyncContext,
        app_key: &str,
        record_name: &str,
        app: &Application,
        extra: Option<&serde_json::Value>,
    ) -> Result<(), ServiceError>;
}

/// Application-level operations with cascading cleanup.
#[async_trait]
pub trait ApplicationService: Send + Sync {
    /// Delete an application and everything that hangs off it.
    async fn delete_application(
        &self,
        ctx: &SyncContext,
        record: &ApplicationRecord,
    ) -> Result<(), ServiceError>;
}
