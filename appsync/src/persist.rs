//! Ordered persistence pipeline.
//!
//! Writes a [`ConversionResult`] in dependency order:
//!
//! ```text
//! project → targets → environment → env binding → components → policies
//!         → workflow → revision → workflow record → application record
//! ```
//!
//! Each step is an idempotent upsert. The first failing step aborts the
//! run and its error is returned unchanged; nothing is rolled back, the
//! next delivery of the event completes the remaining steps. The
//! application record goes last since its presence makes the application
//! visible to readers.

use std::sync::Arc;

use catalog::{
    AppScoped, ApplicationRecord, DataStore, DataStoreExt, Entity, Environment, Target,
};
use tracing::{debug, error};

use crate::context::SyncContext;
use crate::convert::ConversionResult;
use crate::error::{Result, SyncError};
use crate::services::{EnvService, ProjectService, TargetService};

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistStep {
    Project,
    Targets,
    Environment,
    EnvBinding,
    Components,
    Policies,
    Workflow,
    Revision,
    WorkflowRecord,
    AppMeta,
}

impl PersistStep {
    /// Steps in write order.
    pub const ORDER: [PersistStep; 10] = [
        Self::Project,
        Self::Targets,
        Self::Environment,
        Self::EnvBinding,
        Self::Components,
        Self::Policies,
        Self::Workflow,
        Self::Revision,
        Self::WorkflowRecord,
        Self::AppMeta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Targets => "targets",
            Self::Environment => "environment",
            Self::EnvBinding => "env-binding",
            Self::Components => "components",
            Self::Policies => "policies",
            Self::Workflow => "workflow",
            Self::Revision => "revision",
            Self::WorkflowRecord => "workflow-record",
            Self::AppMeta => "app-meta",
        }
    }
}

impl std::fmt::Display for PersistStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    /// Canonical key of the application record
    pub app_key: String,
    /// Revision recorded, empty if none
    pub revision: String,
    pub target_count: i64,
    /// Steps that wrote something, in order
    pub steps: Vec<PersistStep>,
}

/// Services the pipeline writes through.
#[derive(Clone)]
pub struct PipelineServices {
    pub project: Arc<dyn ProjectService>,
    pub target: Arc<dyn TargetService>,
    pub env: Arc<dyn EnvService>,
}

/// Writes conversion results in dependency order.
#[derive(Clone)]
pub struct PersistPipeline {
    store: Arc<dyn DataStore>,
    services: PipelineServices,
}

impl PersistPipeline {
    pub fn new(store: Arc<dyn DataStore>, services: PipelineServices) -> Self {
        Self { store, services }
    }

    /// Persist every sub-entity of `result`, stopping at the first failure.
    pub async fn persist(
        &self,
        ctx: &SyncContext,
        result: &ConversionResult,
    ) -> Result<PersistReport> {
        let app_key = result.app_meta.name.clone();
        let mut steps = Vec::with_capacity(PersistStep::ORDER.len());

        for step in PersistStep::ORDER {
            match self.run_step(ctx, step, result).await {
                Ok(true) => {
                    debug!(app = %app_key, step = %step, "persisted");
                    steps.push(step);
                }
                Ok(false) => debug!(app = %app_key, step = %step, "nothing to persist"),
                Err(err) => {
                    error!(app = %app_key, step = %step, error = %err, "persist step failed");
                    return Err(err);
                }
            }
        }

        Ok(PersistReport {
            app_key,
            revision: result.synced_revision().to_string(),
            target_count: result.target_count(),
            steps,
        })
    }

    /// Run one step. Returns whether the step had anything to write.
    async fn run_step(
        &self,
        ctx: &SyncContext,
        step: PersistStep,
        result: &ConversionResult,
    ) -> Result<bool> {
        let app_key = result.app_meta.name.as_str();
        match step {
            PersistStep::Project => match &result.project {
                Some(project) => {
                    ctx.run(self.services.project.ensure_project(ctx, project))
                        .await?;
                    Ok(true)
                }
                None => Ok(false),
            },
            PersistStep::Targets => {
                for target in &result.targets {
                    ctx.run(self.services.target.ensure_target(ctx, target))
                        .await?;
                }
                Ok(true)
            }
            PersistStep::Environment => {
                ctx.run(self.services.env.upsert_env(ctx, &result.env))
                    .await?;
                Ok(true)
            }
            PersistStep::EnvBinding => {
                let binding = &result.env_binding;
                self.check_env_ready(ctx, &binding.name, &binding.primary_key())
                    .await?;
                ctx.run(self.store.put(&result.env_binding)).await?;
                Ok(true)
            }
            PersistStep::Components => {
                self.replace_all(ctx, app_key, &result.components).await?;
                Ok(true)
            }
            PersistStep::Policies => {
                self.replace_all(ctx, app_key, &result.policies).await?;
                Ok(true)
            }
            PersistStep::Workflow => {
                ctx.run(self.store.put(&result.workflow)).await?;
                Ok(true)
            }
            PersistStep::Revision => match &result.revision {
                Some(revision) => {
                    ctx.run(self.store.put(revision)).await?;
                    Ok(true)
                }
                None => Ok(false),
            },
            PersistStep::WorkflowRecord => match &result.workflow_record {
                Some(record) => {
                    ctx.run(self.store.put(record)).await?;
                    Ok(true)
                }
                None => Ok(false),
            },
            PersistStep::AppMeta => {
                self.store_app_meta(ctx, &result.app_meta).await?;
                Ok(true)
            }
        }
    }

    /// An env binding may only reference an environment whose targets
    /// have all been written.
    async fn check_env_ready(
        &self,
        ctx: &SyncContext,
        env_name: &str,
        binding_key: &str,
    ) -> Result<()> {
        let missing = |what: String| SyncError::MissingDependency {
            entity: "env binding",
            key: binding_key.to_string(),
            missing: what,
        };

        let env = ctx
            .run(self.store.find::<Environment>(env_name))
            .await?
            .ok_or_else(|| missing(format!("environment {}", env_name)))?;
        for target in &env.targets {
            if !ctx.run(self.store.exists::<Target>(target)).await? {
                return Err(missing(format!("target {}", target)));
            }
        }
        Ok(())
    }

    /// Upsert `entities`, then drop entities of the same app that are no
    /// longer declared.
    async fn replace_all<E>(&self, ctx: &SyncContext, app_key: &str, entities: &[E]) -> Result<()>
    where
        E: AppScoped,
    {
        for entity in entities {
            ctx.run(self.store.put(entity)).await?;
        }

        let keep: Vec<String> = entities.iter().map(Entity::primary_key).collect();
        let existing = ctx.run(self.store.list_for_app::<E>(app_key)).await?;
        for stale in existing.iter().filter(|e| !keep.contains(&e.primary_key())) {
            let key = stale.primary_key();
            debug!(app = app_key, kind = E::KIND, key = %key, "removing stale entity");
            ctx.run(self.store.delete::<E>(&key)).await?;
        }
        Ok(())
    }

    /// Write the application record, keeping the original creation time.
    async fn store_app_meta(&self, ctx: &SyncContext, app_meta: &ApplicationRecord) -> Result<()> {
        let existing = ctx
            .run(self.store.find::<ApplicationRecord>(&app_meta.name))
            .await?;

        let mut record = app_meta.clone();
        record.created_at = existing
            .as_ref()
            .and_then(|e| e.created_at)
            .or(record.created_at)
            .or_else(|| Some(chrono::Utc::now()));

        if existing.as_ref() == Some(&record) {
            return Ok(());
        }
        ctx.run(self.store.put(&record)).await?;
        Ok(())
    }
}
