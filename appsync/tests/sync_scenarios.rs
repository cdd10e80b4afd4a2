//! End-to-end reconciliation scenarios
//!
//! These tests drive the synchronizer the way a watcher would, against an
//! in-memory catalog, and check the resulting store state.

use std::sync::Arc;
use std::time::Duration;

use appsync::services::{MockWorkflowService, StoreServices, WorkflowService};
use appsync::{AppSynchronizer, RevisionCache, ServiceError, SyncContext, SyncError};
use async_trait::async_trait;
use catalog::labels::{
    ANNOTATION_APP_NAME, ANNOTATION_PUBLISH_VERSION, LABEL_SOURCE_OF_TRUTH, LABEL_SYNC_NAMESPACE,
};
use catalog::{
    Application, ApplicationComponent, ApplicationRecord, ComponentSpec, DataStoreExt,
    MemoryStore, StoreError, StoreOp,
};

/// Synchronizer over a fresh store, cache and workflow mock
fn harness() -> (Arc<MemoryStore>, Arc<MockWorkflowService>, AppSynchronizer) {
    let store = Arc::new(MemoryStore::new());
    let workflow = Arc::new(MockWorkflowService::new());
    let sync = AppSynchronizer::new(store.clone(), Arc::new(RevisionCache::new()))
        .with_workflow_service(workflow.clone());
    (store, workflow, sync)
}

fn web_app(namespace: &str, version: &str) -> Application {
    Application::new("web", namespace)
        .with_annotation(ANNOTATION_APP_NAME, "web")
        .with_annotation(ANNOTATION_PUBLISH_VERSION, version)
        .with_component(ComponentSpec {
            name: "frontend".to_string(),
            component_type: "webservice".to_string(),
            properties: serde_json::json!({ "image": "nginx:1.27" }),
            traits: vec![],
            depends_on: vec![],
        })
}

#[tokio::test]
async fn test_first_cli_sync_creates_record() {
    let (store, workflow, sync) = harness();
    let ctx = SyncContext::background();

    sync.add_or_update(&ctx, &web_app("prod", "v2")).await.unwrap();

    assert_eq!(
        store.put_kinds(),
        vec![
            "project",
            "target",
            "env",
            "env_binding",
            "application_component",
            "workflow",
            "application_revision",
            "application",
        ]
    );

    let record: ApplicationRecord = store.get("web").await.unwrap();
    assert_eq!(record.sync_namespace(), Some("prod"));
    assert_eq!(record.synced_revision(), Some("v2"));

    let cached = sync.cache().get("web-prod").unwrap();
    assert_eq!(cached.revision, "v2");
    assert_eq!(cached.target_count, 1);

    let calls = workflow.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].app_key, "web");
    assert_eq!(calls[0].record_name, "v2");
}

#[tokio::test]
async fn test_redelivery_leaves_store_unchanged() {
    let (store, workflow, sync) = harness();
    let ctx = SyncContext::background();
    let app = web_app("prod", "v2");

    sync.add_or_update(&ctx, &app).await.unwrap();
    let once = store.snapshot();

    sync.add_or_update(&ctx, &app).await.unwrap();
    assert_eq!(store.snapshot(), once);
    assert_eq!(store.count("application"), 1);
    assert_eq!(workflow.call_count(), 2);
}

#[tokio::test]
async fn test_bare_name_owned_by_other_namespace() {
    let (store, _workflow, sync) = harness();
    let ctx = SyncContext::background();

    sync.add_or_update(&ctx, &web_app("staging", "v1")).await.unwrap();
    let staging_before = store.snapshot()["application"]["web"].clone();

    sync.add_or_update(&ctx, &web_app("prod", "v2")).await.unwrap();

    let prod: ApplicationRecord = store.get("web-prod").await.unwrap();
    assert_eq!(prod.sync_namespace(), Some("prod"));
    assert_eq!(store.snapshot()["application"]["web"], staging_before);
    assert!(store.exists::<catalog::EnvBinding>("web-prod/syncd-prod").await.unwrap());
}

fn app_with_component(namespace: &str, component: &str, image: &str) -> Application {
    Application::new("web", namespace)
        .with_annotation(ANNOTATION_APP_NAME, "web")
        .with_annotation(ANNOTATION_PUBLISH_VERSION, "v1")
        .with_component(ComponentSpec {
            name: component.to_string(),
            component_type: "webservice".to_string(),
            properties: serde_json::json!({ "image": image }),
            traits: vec![],
            depends_on: vec![],
        })
}

#[tokio::test]
async fn test_sub_entities_isolated_between_bare_and_composed_owners() {
    let (store, _workflow, sync) = harness();
    let sync = sync.with_application_service(Arc::new(StoreServices::new(store.clone())));
    let ctx = SyncContext::background();

    // "web" + "prod-api" and "web-prod" + "api" must not share a key
    sync.add_or_update(&ctx, &app_with_component("a", "prod-api", "a"))
        .await
        .unwrap();
    sync.add_or_update(&ctx, &app_with_component("prod", "api", "b"))
        .await
        .unwrap();

    let owned_by_a: Vec<ApplicationComponent> = store.list_for_app("web").await.unwrap();
    assert_eq!(owned_by_a.len(), 1);
    assert_eq!(owned_by_a[0].name, "prod-api");
    assert_eq!(owned_by_a[0].properties["image"], "a");

    let owned_by_prod: Vec<ApplicationComponent> = store.list_for_app("web-prod").await.unwrap();
    assert_eq!(owned_by_prod.len(), 1);
    assert_eq!(owned_by_prod[0].properties["image"], "b");

    sync.delete_app(&ctx, &app_with_component("prod", "api", "b"))
        .await
        .unwrap();
    let owned_by_a: Vec<ApplicationComponent> = store.list_for_app("web").await.unwrap();
    assert_eq!(owned_by_a.len(), 1);
    assert_eq!(store.count("application_component"), 1);
}

#[tokio::test]
async fn test_delete_composed_record_keeps_bare_owner() {
    let (store, _workflow, sync) = harness();
    let ctx = SyncContext::background();

    sync.add_or_update(&ctx, &web_app("staging", "v1")).await.unwrap();
    sync.add_or_update(&ctx, &web_app("prod", "v2")).await.unwrap();

    sync.delete_app(&ctx, &web_app("prod", "v2")).await.unwrap();

    assert!(!store.exists::<ApplicationRecord>("web-prod").await.unwrap());
    let staging: ApplicationRecord = store.get("web").await.unwrap();
    assert_eq!(staging.sync_namespace(), Some("staging"));
}

#[tokio::test]
async fn test_cascade_delete_removes_dependents() {
    let (store, _workflow, sync) = harness();
    let sync = sync.with_application_service(Arc::new(StoreServices::new(store.clone())));
    let ctx = SyncContext::background();
    let app = web_app("prod", "v2");

    sync.add_or_update(&ctx, &app).await.unwrap();
    sync.delete_app(&ctx, &app).await.unwrap();

    for kind in [
        "application",
        "application_component",
        "env_binding",
        "workflow",
        "application_revision",
    ] {
        assert_eq!(store.count(kind), 0, "{} left behind", kind);
    }
    // shared entities stay
    assert_eq!(store.count("env"), 1);
    assert_eq!(store.count("target"), 1);
}

#[tokio::test]
async fn test_name_freed_by_delete_is_reclaimed() {
    let (store, _workflow, sync) = harness();
    let ctx = SyncContext::background();

    sync.add_or_update(&ctx, &web_app("staging", "v1")).await.unwrap();
    sync.delete_app(&ctx, &web_app("staging", "v1")).await.unwrap();
    sync.add_or_update(&ctx, &web_app("prod", "v2")).await.unwrap();

    let record: ApplicationRecord = store.get("web").await.unwrap();
    assert_eq!(record.sync_namespace(), Some("prod"));
}

#[tokio::test]
async fn test_console_app_only_reflects_workflow() {
    let (store, workflow, sync) = harness();
    let app = web_app("prod", "v5").with_label(LABEL_SOURCE_OF_TRUTH, "from-uxdb");

    sync.add_or_update(&SyncContext::background(), &app)
        .await
        .unwrap();

    assert!(store.put_kinds().is_empty());
    assert_eq!(workflow.calls()[0].record_name, "v5");
    assert!(sync.cache().is_empty());

    // console deletes belong to the console
    store
        .put(&ApplicationRecord::new("web").with_label(LABEL_SYNC_NAMESPACE, "prod"))
        .await
        .unwrap();
    sync.delete_app(&SyncContext::background(), &app)
        .await
        .unwrap();
    assert!(store.exists::<ApplicationRecord>("web").await.unwrap());
}

#[tokio::test]
async fn test_console_app_without_app_name_fails() {
    let (_store, workflow, sync) = harness();
    let app = Application::new("web", "prod").with_label(LABEL_SOURCE_OF_TRUTH, "from-uxdb");

    let err = sync
        .add_or_update(&SyncContext::background(), &app)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MissingAppName { .. }));
    assert_eq!(workflow.call_count(), 0);
}

#[tokio::test]
async fn test_unrecognized_origin_is_skipped() {
    let (store, workflow, sync) = harness();
    let app = web_app("prod", "v2").with_label(LABEL_SOURCE_OF_TRUTH, "from-inner-system");

    sync.add_or_update(&SyncContext::background(), &app)
        .await
        .unwrap();
    sync.delete_app(&SyncContext::background(), &app)
        .await
        .unwrap();

    assert!(store.journal().is_empty());
    assert_eq!(workflow.call_count(), 0);
}

#[tokio::test]
async fn test_status_revision_names_workflow_record() {
    let (_store, workflow, sync) = harness();
    let mut app = Application::new("api", "prod");
    app.status.workflow = Some(catalog::WorkflowStatus {
        app_revision: "api-v3:8f2c".to_string(),
        phase: "executing".to_string(),
        finished: false,
        steps: vec![],
    });

    sync.add_or_update(&SyncContext::background(), &app)
        .await
        .unwrap();
    assert_eq!(workflow.calls()[0].record_name, "api-v3-8f2c");
}

#[tokio::test]
async fn test_failed_step_completes_on_redelivery() {
    let (store, workflow, sync) = harness();
    let ctx = SyncContext::background();
    let app = web_app("prod", "v2");

    store.fail_on(StoreOp::Put, "application_component");
    let err = sync.add_or_update(&ctx, &app).await.unwrap_err();
    assert_eq!(
        err,
        SyncError::Store(StoreError::Backend(
            "injected put failure on application_component".to_string()
        ))
    );
    assert_eq!(store.count("application"), 0);
    assert!(sync.cache().get("web-prod").is_none());
    assert_eq!(workflow.call_count(), 0);

    store.clear_failures();
    sync.add_or_update(&ctx, &app).await.unwrap();
    assert_eq!(store.count("application"), 1);
    assert_eq!(store.count("application_component"), 1);
    assert!(sync.cache().get("web-prod").is_some());
}

#[tokio::test]
async fn test_cancelled_event_writes_nothing() {
    let (store, workflow, sync) = harness();
    let (ctx, handle) = SyncContext::cancellable();
    handle.cancel();

    let err = sync
        .add_or_update(&ctx, &web_app("prod", "v2"))
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::Cancelled);
    assert!(store.journal().is_empty());
    assert_eq!(workflow.call_count(), 0);
}

/// Workflow service that never answers in time
struct StalledWorkflow;

#[async_trait]
impl WorkflowService for StalledWorkflow {
    async fn sync_workflow_record(
        &self,
        _ctx: &SyncContext,
        _app_key: &str,
        _record_name: &str,
        _app: &Application,
        _extra: Option<&serde_json::Value>,
    ) -> Result<(), ServiceError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_deadline_aborts_stalled_collaborator() {
    let (store, _workflow, sync) = harness();
    let sync = sync.with_workflow_service(Arc::new(StalledWorkflow));
    let ctx = SyncContext::background().with_timeout(Duration::from_millis(200));

    let err = sync
        .add_or_update(&ctx, &web_app("prod", "v2"))
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::DeadlineExceeded);
    // metadata landed before the stalled call
    assert_eq!(store.count("application"), 1);
}

#[tokio::test]
async fn test_concurrent_events_for_different_apps() {
    let (store, workflow, sync) = harness();

    let mut handles = Vec::new();
    for i in 0..16 {
        let sync = sync.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("svc-{}", i);
            let app = Application::new(name.as_str(), "prod")
                .with_annotation(ANNOTATION_APP_NAME, name.as_str())
                .with_annotation(ANNOTATION_PUBLISH_VERSION, "v1");
            sync.add_or_update(&SyncContext::background(), &app).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.count("application"), 16);
    assert_eq!(sync.cache().len(), 16);
    assert_eq!(workflow.call_count(), 16);
    assert_eq!(store.count("env"), 1);
}
