//! Datastore-backed collaborator services.
//!
//! One type implements every service trait on top of a [`DataStore`],
//! so a host needs nothing beyond a store to run the synchronizer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use catalog::{
    scoped_key, AppScoped, Application, ApplicationComponent, ApplicationPolicy,
    ApplicationRecord, ApplicationRevision, DataStore, DataStoreExt, EnvBinding, Environment,
    Project, Target, Workflow, WorkflowRecord, WorkflowStepRecord,
};

use super::traits::*;
use crate::context::SyncContext;
use crate::error::ServiceError;

/// All collaborator services, backed by one datastore.
#[derive(Clone)]
pub struct StoreServices {
    store: Arc<dyn DataStore>,
}

impl StoreServices {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn delete_all<E: AppScoped>(
        &self,
        ctx: &SyncContext,
        app_primary_key: &str,
    ) -> Result<usize, ServiceError> {
        let entities = ctx
            .run(self.store.list_for_app::<E>(app_primary_key))
            .await
            .map_err(into_service_error)?;
        for entity in &entities {
            ctx.run(self.store.delete::<E>(&entity.primary_key()))
                .await
                .map_err(into_service_error)?;
        }
        Ok(entities.len())
    }
}

/// Collapse a context error back into the service error space.
fn into_service_error(err: crate::error::SyncError) -> ServiceError {
    match err {
        crate::error::SyncError::Store(err) => ServiceError::Store(err),
        crate::error::SyncError::Service(err) => err,
        other => ServiceError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ProjectService for StoreServices {
    async fn ensure_project(
        &self,
        ctx: &SyncContext,
        project: &Project,
    ) -> Result<(), ServiceError> {
        let existing = ctx
            .run(self.store.find::<Project>(&project.name))
            .await
            .map_err(into_service_error)?;
        if existing.is_some() {
            return Ok(());
        }

        let mut project = project.clone();
        project.created_at.get_or_insert_with(chrono::Utc::now);
        ctx.run(self.store.put(&project))
            .await
            .map_err(into_service_error)?;
        info!(project = %project.name, "created project");
        Ok(())
    }
}

#[async_trait]
impl TargetService for StoreServices {
    async fn ensure_target(&self, ctx: &SyncContext, target: &Target) -> Result<(), ServiceError> {
        let existing = ctx
            .run(self.store.find::<Target>(&target.name))
            .await
            .map_err(into_service_error)?;
        if existing.as_ref() == Some(target) {
            return Ok(());
        }
        ctx.run(self.store.put(target))
            .await
            .map_err(into_service_error)?;
        debug!(target = %target.name, cluster = %target.cluster, "stored target");
        Ok(())
    }
}

#[async_trait]
impl EnvService for StoreServices {
    async fn upsert_env(&self, ctx: &SyncContext, env: &Environment) -> Result<(), ServiceError> {
        let existing = ctx
            .run(self.store.find::<Environment>(&env.name))
            .await
            .map_err(into_service_error)?;

        let merged = match existing {
            Some(existing) => {
                let mut merged = existing.clone();
                for target in &env.targets {
                    if !merged.targets.contains(target) {
                        merged.targets.push(target.clone());
                    }
                }
                if merged == existing {
                    return Ok(());
                }
                merged
            }
            None => env.clone(),
        };

        ctx.run(self.store.put(&merged))
            .await
            .map_err(into_service_error)?;
        debug!(env = %merged.name, targets = merged.targets.len(), "stored environment");
        Ok(())
    }
}

#[async_trait]
impl WorkflowService for StoreServices {
    async fn sync_workflow_record(
        &self,
        ctx: &SyncContext,
        app_key: &str,
        record_name: &str,
        app: &Application,
        _extra: Option<&serde_json::Value>,
    ) -> Result<(), ServiceError> {
        if record_name.is_empty() {
            debug!(app = %app_key, "no record name, nothing to reflect");
            return Ok(());
        }
        let Some(status) = app.status.workflow.as_ref() else {
            debug!(app = %app_key, record = record_name, "no workflow status yet");
            return Ok(());
        };

        let key = scoped_key(app_key, record_name);
        let existing = ctx
            .run(self.store.find::<WorkflowRecord>(&key))
            .await
            .map_err(into_service_error)?;

        let mut record = existing.clone().unwrap_or_else(|| WorkflowRecord {
            app_primary_key: app_key.to_string(),
            name: record_name.to_string(),
            workflow_name: String::new(),
            revision_primary_key: app
                .synced_revision()
                .map(|revision| scoped_key(app_key, &revision))
                .unwrap_or_default(),
            phase: String::new(),
            finished: false,
            steps: Vec::new(),
        });
        record.phase = status.phase.clone();
        record.finished = status.finished;
        record.steps = status
            .steps
            .iter()
            .map(|step| WorkflowStepRecord {
                name: step.name.clone(),
                phase: step.phase.clone(),
            })
            .collect();

        if existing.as_ref() == Some(&record) {
            return Ok(());
        }
        ctx.run(self.store.put(&record))
            .await
            .map_err(into_service_error)?;
        debug!(app = %app_key, record = record_name, phase = %record.phase, "synced workflow record");
        Ok(())
    }
}

#[async_trait]
impl ApplicationService for StoreServices {
    async fn delete_application(
        &self,
        ctx: &SyncContext,
        record: &ApplicationRecord,
    ) -> Result<(), ServiceError> {
        let app = record.name.as_str();
        let mut removed = 0;
        removed += self.delete_all::<ApplicationComponent>(ctx, app).await?;
        removed += self.delete_all::<ApplicationPolicy>(ctx, app).await?;
        removed += self.delete_all::<EnvBinding>(ctx, app).await?;
        removed += self.delete_all::<Workflow>(ctx, app).await?;
        removed += self.delete_all::<ApplicationRevision>(ctx, app).await?;
        removed += self.delete_all::<WorkflowRecord>(ctx, app).await?;

        ctx.run(self.store.delete::<ApplicationRecord>(app))
            .await
            .map_err(into_service_error)?;
        info!(app, dependents = removed, "deleted application");
        Ok(())
    }
}
