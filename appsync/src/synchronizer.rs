//! Reconciliation entry points.
//!
//! [`AppSynchronizer`] is what a watcher calls for every observed event:
//! [`add_or_update`](AppSynchronizer::add_or_update) on create/update and
//! [`delete_app`](AppSynchronizer::delete_app) on delete. Events for
//! different applications may be handled concurrently; events for the same
//! application are expected to arrive serialized.

use std::sync::Arc;

use catalog::{Application, ApplicationRecord, DataStore, DataStoreExt, Entity, StoreError};
use tracing::{debug, info, warn};

use crate::cache::{composed_name, RevisionCache};
use crate::config::SyncConfig;
use crate::context::SyncContext;
use crate::convert::{AppConverter, DefaultConverter};
use crate::error::{Result, SyncError};
use crate::naming::NameResolver;
use crate::origin::{LabelClassifier, Origin, OriginClassifier, SyncEvent};
use crate::persist::{PersistPipeline, PersistReport, PipelineServices};
use crate::services::{
    ApplicationService, EnvService, ProjectService, StoreServices, TargetService, WorkflowService,
};

/// How a delete removes the application record.
#[derive(Clone)]
pub enum AppDeletion {
    /// Delegate to the application service, which cleans up dependents
    Cascade(Arc<dyn ApplicationService>),
    /// Remove only the application record
    Direct,
}

/// Synchronizes live applications into the catalog.
#[derive(Clone)]
pub struct AppSynchronizer {
    config: SyncConfig,
    store: Arc<dyn DataStore>,
    cache: Arc<RevisionCache>,
    resolver: NameResolver,
    classifier: Arc<dyn OriginClassifier>,
    converter: Arc<dyn AppConverter>,
    project_service: Arc<dyn ProjectService>,
    target_service: Arc<dyn TargetService>,
    env_service: Arc<dyn EnvService>,
    workflow_service: Arc<dyn WorkflowService>,
    deletion: AppDeletion,
}

impl AppSynchronizer {
    /// Create a synchronizer with store-backed services and default config.
    ///
    /// Deletes remove only the application record until an application
    /// service is wired with [`with_application_service`](Self::with_application_service).
    pub fn new(store: Arc<dyn DataStore>, cache: Arc<RevisionCache>) -> Self {
        let services = Arc::new(StoreServices::new(store.clone()));
        let config = SyncConfig::default();
        Self {
            resolver: NameResolver::new(store.clone()),
            classifier: Arc::new(
                LabelClassifier::new()
                    .with_skip_unchanged_revisions(config.skip_unchanged_revisions),
            ),
            converter: Arc::new(DefaultConverter::new(config.clone())),
            project_service: services.clone(),
            target_service: services.clone(),
            env_service: services.clone(),
            workflow_service: services,
            deletion: AppDeletion::Direct,
            config,
            store,
            cache,
        }
    }

    /// Builder: replace the config. Resets the classifier and converter to
    /// the defaults derived from it.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.classifier = Arc::new(
            LabelClassifier::new().with_skip_unchanged_revisions(config.skip_unchanged_revisions),
        );
        self.converter = Arc::new(DefaultConverter::new(config.clone()));
        self.config = config;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn OriginClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn AppConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_project_service(mut self, service: Arc<dyn ProjectService>) -> Self {
        self.project_service = service;
        self
    }

    pub fn with_target_service(mut self, service: Arc<dyn TargetService>) -> Self {
        self.target_service = service;
        self
    }

    pub fn with_env_service(mut self, service: Arc<dyn EnvService>) -> Self {
        self.env_service = service;
        self
    }

    pub fn with_workflow_service(mut self, service: Arc<dyn WorkflowService>) -> Self {
        self.workflow_service = service;
        self
    }

    /// Builder: delegate deletes to `service`.
    pub fn with_application_service(mut self, service: Arc<dyn ApplicationService>) -> Self {
        self.deletion = AppDeletion::Cascade(service);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The revision cache this synchronizer writes.
    pub fn cache(&self) -> &Arc<RevisionCache> {
        &self.cache
    }

    /// Handle a create or update event.
    pub async fn add_or_update(&self, ctx: &SyncContext, app: &Application) -> Result<()> {
        match self.classifier.classify(app) {
            Origin::Console => self.sync_console_app(ctx, app).await,
            Origin::Cli => self.sync_cli_app(ctx, app).await,
            Origin::Unrecognized => {
                info!(
                    app = app.name(),
                    namespace = app.namespace(),
                    "skipping application of unrecognized origin"
                );
                Ok(())
            }
        }
    }

    /// Console-created apps already live in the catalog; only their
    /// workflow status is reflected.
    async fn sync_console_app(&self, ctx: &SyncContext, app: &Application) -> Result<()> {
        let Some(app_key) = app.app_name_annotation() else {
            return Err(SyncError::MissingAppName {
                name: app.name().to_string(),
                namespace: app.namespace().to_string(),
            });
        };

        let record_name = app.publish_version().unwrap_or_default();
        if record_name.is_empty() {
            warn!(
                app = app_key,
                namespace = app.namespace(),
                "no publish version on console application"
            );
        }
        ctx.run(
            self.workflow_service
                .sync_workflow_record(ctx, app_key, record_name, app, None),
        )
        .await
    }

    async fn sync_cli_app(&self, ctx: &SyncContext, app: &Application) -> Result<()> {
        let composed = composed_name(app.name(), app.namespace());
        let cached = self.cache.get(&composed);

        let resolved = self.resolver.resolve(ctx, app.name(), app.namespace()).await?;
        let app_key = resolved.key;

        if self
            .classifier
            .needs_metadata_sync(app, SyncEvent::AddOrUpdate, cached.as_ref())
        {
            let report = self.sync_metadata(ctx, app, &app_key).await?;
            self.cache
                .put(composed.as_str(), report.revision.as_str(), report.target_count);
            info!(
                app = %app_key,
                namespace = app.namespace(),
                revision = %report.revision,
                targets = report.target_count,
                "synced application from cli"
            );
        } else {
            debug!(app = %app_key, namespace = app.namespace(), "metadata sync not due");
        }

        let Some(record_name) = app.record_name() else {
            warn!(
                app = %app_key,
                namespace = app.namespace(),
                "no publish version or status revision, skipping workflow record sync"
            );
            return Ok(());
        };
        ctx.run(
            self.workflow_service
                .sync_workflow_record(ctx, &app_key, &record_name, app, None),
        )
        .await
    }

    async fn sync_metadata(
        &self,
        ctx: &SyncContext,
        app: &Application,
        app_key: &str,
    ) -> Result<PersistReport> {
        let result = self.converter.convert(ctx, app, app_key).await?;
        let pipeline = PersistPipeline::new(
            self.store.clone(),
            PipelineServices {
                project: self.project_service.clone(),
                target: self.target_service.clone(),
                env: self.env_service.clone(),
            },
        );
        pipeline.persist(ctx, &result).await
    }

    /// Handle a delete event.
    ///
    /// Resources the synchronizer does not own are ignored. Deleting an
    /// application that was never synced returns the store's "not found"
    /// error; see [`SyncError::is_not_found`].
    pub async fn delete_app(&self, ctx: &SyncContext, app: &Application) -> Result<()> {
        if !self.classifier.is_cli_origin(app)
            && !self
                .classifier
                .needs_metadata_sync(app, SyncEvent::Delete, None)
        {
            debug!(app = app.name(), namespace = app.namespace(), "delete not owned, ignoring");
            return Ok(());
        }

        let resolved = self.resolver.resolve(ctx, app.name(), app.namespace()).await?;
        let Some(record) = resolved.record else {
            return Err(StoreError::not_found(ApplicationRecord::KIND, resolved.key).into());
        };

        match &self.deletion {
            AppDeletion::Cascade(service) => {
                ctx.run(service.delete_application(ctx, &record)).await?;
            }
            AppDeletion::Direct => {
                ctx.run(self.store.delete::<ApplicationRecord>(&record.name))
                    .await?;
            }
        }
        info!(app = %record.name, namespace = app.namespace(), "deleted application");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MockApplicationService, MockWorkflowService};
    use catalog::labels::{
        ANNOTATION_APP_NAME, ANNOTATION_PUBLISH_VERSION, LABEL_SOURCE_OF_TRUTH,
        LABEL_SYNC_NAMESPACE,
    };
    use catalog::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, Arc<MockWorkflowService>, AppSynchronizer) {
        let store = Arc::new(MemoryStore::new());
        let workflow = Arc::new(MockWorkflowService::new());
        let sync = AppSynchronizer::new(store.clone(), Arc::new(RevisionCache::new()))
            .with_workflow_service(workflow.clone());
        (store, workflow, sync)
    }

    fn cli_app(name: &str, namespace: &str, version: &str) -> Application {
        Application::new(name, namespace)
            .with_annotation(ANNOTATION_APP_NAME, name)
            .with_annotation(ANNOTATION_PUBLISH_VERSION, version)
    }

    #[tokio::test]
    async fn test_cli_app_populates_cache() {
        let (_store, workflow, sync) = setup();
        let ctx = SyncContext::background();

        sync.add_or_update(&ctx, &cli_app("web", "prod", "v2"))
            .await
            .unwrap();

        let cached = sync.cache().get("web-prod").unwrap();
        assert_eq!(cached.revision, "v2");
        assert_eq!(cached.target_count, 1);
        assert_eq!(workflow.call_count(), 1);
        assert_eq!(workflow.calls()[0].record_name, "v2");
    }

    #[tokio::test]
    async fn test_console_app_requires_app_name() {
        let (store, workflow, sync) = setup();
        let app = Application::new("web", "prod").with_label(LABEL_SOURCE_OF_TRUTH, "from-uxdb");

        let err = sync
            .add_or_update(&SyncContext::background(), &app)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::MissingAppName {
                name: "web".to_string(),
                namespace: "prod".to_string(),
            }
        );
        assert_eq!(workflow.call_count(), 0);
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_console_app_only_syncs_workflow() {
        let (store, workflow, sync) = setup();
        let app = cli_app("web", "prod", "v3").with_label(LABEL_SOURCE_OF_TRUTH, "from-uxdb");

        sync.add_or_update(&SyncContext::background(), &app)
            .await
            .unwrap();
        assert_eq!(workflow.calls()[0].app_key, "web");
        assert_eq!(workflow.calls()[0].record_name, "v3");
        assert!(store.journal().is_empty());
        assert!(sync.cache().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record_name_skips_workflow_sync() {
        let (store, workflow, sync) = setup();
        let app = Application::new("web", "prod");

        sync.add_or_update(&SyncContext::background(), &app)
            .await
            .unwrap();
        assert_eq!(workflow.call_count(), 0);
        assert_eq!(store.count("application"), 1);
    }

    #[tokio::test]
    async fn test_skip_unchanged_revision() {
        let (store, workflow, sync) = setup();
        let sync = sync
            .with_config(SyncConfig {
                skip_unchanged_revisions: true,
                ..SyncConfig::default()
            })
            .with_workflow_service(workflow.clone());
        let ctx = SyncContext::background();
        let app = cli_app("web", "prod", "v2");

        sync.add_or_update(&ctx, &app).await.unwrap();
        store.clear_journal();
        sync.add_or_update(&ctx, &app).await.unwrap();

        assert!(store.put_kinds().is_empty());
        assert_eq!(workflow.call_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_direct_removes_record_only() {
        let (store, _workflow, sync) = setup();
        let ctx = SyncContext::background();
        let app = cli_app("web", "prod", "v2");

        sync.add_or_update(&ctx, &app).await.unwrap();
        sync.delete_app(&ctx, &app).await.unwrap();

        assert!(!store.exists::<ApplicationRecord>("web").await.unwrap());
        // dependents are left for the application service to clean up
        assert_eq!(store.count("env_binding"), 1);
    }

    #[tokio::test]
    async fn test_delete_delegates_to_application_service() {
        let (store, _workflow, sync) = setup();
        let apps = Arc::new(MockApplicationService::new());
        let sync = sync.with_application_service(apps.clone());
        let ctx = SyncContext::background();
        let app = cli_app("web", "prod", "v2");

        sync.add_or_update(&ctx, &app).await.unwrap();
        sync.delete_app(&ctx, &app).await.unwrap();

        assert_eq!(apps.deleted(), vec!["web".to_string()]);
        assert!(store.exists::<ApplicationRecord>("web").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_unknown_app_is_not_found() {
        let (_store, _workflow, sync) = setup();
        let err = sync
            .delete_app(&SyncContext::background(), &cli_app("web", "prod", "v2"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_console_app_ignored() {
        let (store, _workflow, sync) = setup();
        let record = ApplicationRecord::new("web").with_label(LABEL_SYNC_NAMESPACE, "prod");
        store.put(&record).await.unwrap();

        let app = cli_app("web", "prod", "v2").with_label(LABEL_SOURCE_OF_TRUTH, "from-uxdb");
        sync.delete_app(&SyncContext::background(), &app)
            .await
            .unwrap();
        assert!(store.exists::<ApplicationRecord>("web").await.unwrap());
    }
}
