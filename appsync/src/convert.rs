//! Conversion of a live resource into catalog entities.
//!
//! A [`ConversionResult`] bundles every sub-entity one sync writes. It is
//! owned by a single pipeline run and dropped once the run finishes.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use catalog::labels::{
    SourceOfTruth, LABEL_SOURCE_OF_TRUTH, LABEL_SYNC_NAMESPACE, LABEL_SYNC_REVISION,
};
use catalog::{
    scoped_key, Application, ApplicationComponent, ApplicationPolicy, ApplicationRecord,
    ApplicationRevision, ComponentTrait, EnvBinding, Environment, Project, Target, Workflow,
    WorkflowRecord, WorkflowStep, WorkflowStepRecord,
};

use crate::config::SyncConfig;
use crate::context::SyncContext;
use crate::error::{Result, SyncError};

/// Policy type whose properties select clusters and a namespace.
pub const TOPOLOGY_POLICY: &str = "topology";

/// Everything one full sync persists.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    /// Application record, written last
    pub app_meta: ApplicationRecord,
    pub project: Option<Project>,
    pub targets: Vec<Target>,
    pub env: Environment,
    pub env_binding: EnvBinding,
    pub components: Vec<ApplicationComponent>,
    pub policies: Vec<ApplicationPolicy>,
    pub workflow: Workflow,
    pub revision: Option<ApplicationRevision>,
    pub workflow_record: Option<WorkflowRecord>,
}

impl ConversionResult {
    /// Revision identifier recorded by this sync, empty if unknown.
    pub fn synced_revision(&self) -> &str {
        self.revision
            .as_ref()
            .map(|r| r.version.as_str())
            .unwrap_or_default()
    }

    pub fn target_count(&self) -> i64 {
        self.targets.len() as i64
    }
}

/// Converts a live resource into catalog entities.
#[async_trait]
pub trait AppConverter: Send + Sync {
    /// Convert `app`, storing it under the canonical key `app_key`.
    async fn convert(
        &self,
        ctx: &SyncContext,
        app: &Application,
        app_key: &str,
    ) -> Result<ConversionResult>;
}

/// Converter driven by [`SyncConfig`] naming rules.
#[derive(Debug, Clone, Default)]
pub struct DefaultConverter {
    config: SyncConfig,
}

impl DefaultConverter {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    fn targets(&self, app: &Application, project: &str) -> Vec<Target> {
        let mut targets: Vec<Target> = Vec::new();
        for policy in app
            .spec
            .policies
            .iter()
            .filter(|p| p.policy_type == TOPOLOGY_POLICY)
        {
            let namespace = policy
                .properties
                .get("namespace")
                .and_then(|v| v.as_str())
                .filter(|ns| !ns.is_empty())
                .unwrap_or(app.namespace());
            let clusters: Vec<&str> = policy
                .properties
                .get("clusters")
                .and_then(|v| v.as_array())
                .map(|list| list.iter().filter_map(|c| c.as_str()).collect())
                .unwrap_or_default();
            let clusters = if clusters.is_empty() {
                vec![self.config.default_cluster.as_str()]
            } else {
                clusters
            };

            for cluster in clusters {
                let name = format!("{}-{}", cluster, namespace);
                if targets.iter().any(|t| t.name == name) {
                    continue;
                }
                targets.push(Target {
                    name,
                    alias: String::new(),
                    project: project.to_string(),
                    cluster: cluster.to_string(),
                    namespace: namespace.to_string(),
                });
            }
        }

        if targets.is_empty() {
            targets.push(Target {
                name: self.config.default_target_name(app.namespace()),
                alias: String::new(),
                project: project.to_string(),
                cluster: self.config.default_cluster.clone(),
                namespace: app.namespace().to_string(),
            });
        }
        targets
    }

    fn workflow(&self, app: &Application, app_key: &str, env_name: &str) -> Workflow {
        let mut steps: Vec<WorkflowStep> = app
            .spec
            .workflow
            .iter()
            .flat_map(|w| w.steps.iter())
            .map(|step| WorkflowStep {
                name: step.name.clone(),
                step_type: step.step_type.clone(),
                properties: step.properties.clone(),
            })
            .collect();
        if steps.is_empty() {
            steps.push(WorkflowStep {
                name: "deploy".to_string(),
                step_type: "deploy".to_string(),
                properties: serde_json::Value::Null,
            });
        }

        Workflow {
            app_primary_key: app_key.to_string(),
            name: format!("workflow-{}", env_name),
            env_name: env_name.to_string(),
            default: true,
            steps,
        }
    }

    fn revision(
        &self,
        app: &Application,
        app_key: &str,
        workflow: &Workflow,
    ) -> Result<Option<ApplicationRevision>> {
        let Some(version) = app.synced_revision() else {
            return Ok(None);
        };
        let apply_app_config = serde_json::to_string(&app.spec)
            .map_err(|e| SyncError::Conversion(format!("encode spec of {}: {}", app_key, e)))?;
        let config_hash = hex::encode(Sha256::digest(apply_app_config.as_bytes()));

        Ok(Some(ApplicationRevision {
            app_primary_key: app_key.to_string(),
            version,
            revision_cr_name: app
                .status
                .latest_revision
                .as_ref()
                .map(|r| r.name.clone())
                .unwrap_or_default(),
            env_name: workflow.env_name.clone(),
            workflow_name: workflow.name.clone(),
            config_hash,
            apply_app_config,
        }))
    }
}

#[async_trait]
impl AppConverter for DefaultConverter {
    async fn convert(
        &self,
        ctx: &SyncContext,
        app: &Application,
        app_key: &str,
    ) -> Result<ConversionResult> {
        ctx.check()?;

        let project = self.config.default_project.clone();
        let targets = self.targets(app, &project);
        let env_name = self.config.env_name(app.namespace());
        let env = Environment {
            name: env_name.clone(),
            alias: String::new(),
            project: project.clone(),
            namespace: app.namespace().to_string(),
            targets: targets.iter().map(|t| t.name.clone()).collect(),
        };
        let env_binding = EnvBinding {
            app_primary_key: app_key.to_string(),
            name: env_name.clone(),
            app_deploy_name: app.name().to_string(),
        };

        let components = app
            .spec
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| ApplicationComponent {
                app_primary_key: app_key.to_string(),
                name: c.name.clone(),
                component_type: c.component_type.clone(),
                main: i == 0,
                properties: c.properties.clone(),
                traits: c
                    .traits
                    .iter()
                    .map(|t| ComponentTrait {
                        trait_type: t.trait_type.clone(),
                        properties: t.properties.clone(),
                    })
                    .collect(),
                depends_on: c.depends_on.clone(),
            })
            .collect();
        let policies = app
            .spec
            .policies
            .iter()
            .map(|p| ApplicationPolicy {
                app_primary_key: app_key.to_string(),
                name: p.name.clone(),
                policy_type: p.policy_type.clone(),
                properties: p.properties.clone(),
            })
            .collect();

        let workflow = self.workflow(app, app_key, &env_name);
        let revision = self.revision(app, app_key, &workflow)?;

        let workflow_record = match (app.record_name(), app.status.workflow.as_ref()) {
            (Some(name), Some(status)) => Some(WorkflowRecord {
                app_primary_key: app_key.to_string(),
                name,
                workflow_name: workflow.name.clone(),
                revision_primary_key: revision
                    .as_ref()
                    .map(|r| scoped_key(app_key, &r.version))
                    .unwrap_or_default(),
                phase: status.phase.clone(),
                finished: status.finished,
                steps: status
                    .steps
                    .iter()
                    .map(|s| WorkflowStepRecord {
                        name: s.name.clone(),
                        phase: s.phase.clone(),
                    })
                    .collect(),
            }),
            _ => None,
        };

        let mut app_meta = ApplicationRecord::new(app_key)
            .with_label(LABEL_SYNC_NAMESPACE, app.namespace())
            .with_label(LABEL_SOURCE_OF_TRUTH, SourceOfTruth::Cli.as_str());
        if let Some(revision) = &revision {
            app_meta = app_meta.with_label(LABEL_SYNC_REVISION, revision.version.clone());
        }
        app_meta.alias = app.name().to_string();
        app_meta.project = project.clone();

        Ok(ConversionResult {
            app_meta,
            project: Some(Project::new(project)),
            targets,
            env,
            env_binding,
            components,
            policies,
            workflow,
            revision,
            workflow_record,
        })
    }
}
