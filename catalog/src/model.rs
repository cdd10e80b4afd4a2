//! Persisted catalog entities.
//!
//! Every entity has a kind (its table) and a primary key. Sub-entities of an
//! application are keyed by `<app>-<name>` and carry the application's
//! primary key so they can be listed and removed per application.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::labels::{LABEL_SOURCE_OF_TRUTH, LABEL_SYNC_NAMESPACE, LABEL_SYNC_REVISION};

/// A record the datastore can hold.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Table name for this entity.
    const KIND: &'static str;

    /// Primary key within the table.
    fn primary_key(&self) -> String;
}

/// An entity owned by a single application.
pub trait AppScoped: Entity {
    /// Primary key of the owning application record.
    fn app_primary_key(&self) -> &str;
}

/// Separator between the owning application key and the entity name.
///
/// Resource names cannot contain `/`, so the owner is always the segment
/// before the first separator.
pub const SCOPE_SEPARATOR: char = '/';

/// Key for a sub-entity scoped to an application.
pub fn scoped_key(app_primary_key: &str, name: &str) -> String {
    format!("{}{}{}", app_primary_key, SCOPE_SEPARATOR, name)
}

/// The persisted application record.
///
/// Its presence marks the application as known to the catalog, so it is
/// the last record a sync writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Primary key: the bare declared name or `name-namespace`
    pub name: String,
    /// Display name
    #[serde(default)]
    pub alias: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Project this application belongs to
    #[serde(default)]
    pub project: String,
    /// Sync bookkeeping labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// When the record was first written
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    /// Create an empty record under the given key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: String::new(),
            description: String::new(),
            project: String::new(),
            labels: BTreeMap::new(),
            created_at: None,
        }
    }

    /// Builder: set a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Look up a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Namespace that owns the bare name of this record.
    pub fn sync_namespace(&self) -> Option<&str> {
        self.label(LABEL_SYNC_NAMESPACE)
    }

    /// Source-of-truth label, if recorded.
    pub fn source_of_truth(&self) -> Option<&str> {
        self.label(LABEL_SOURCE_OF_TRUTH)
    }

    /// Revision last written by a full sync.
    pub fn synced_revision(&self) -> Option<&str> {
        self.label(LABEL_SYNC_REVISION)
    }
}

impl Entity for ApplicationRecord {
    const KIND: &'static str = "application";

    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

/// A project grouping applications, targets and environments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: String::new(),
            description: String::new(),
            created_at: None,
        }
    }
}

impl Entity for Project {
    const KIND: &'static str = "project";

    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

/// A deployment target: one namespace on one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    pub project: String,
    pub cluster: String,
    pub namespace: String,
}

impl Entity for Target {
    const KIND: &'static str = "target";

    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

/// An environment: a named set of targets within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    pub project: String,
    pub namespace: String,
    /// Target names, in declaration order
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Entity for Environment {
    const KIND: &'static str = "env";

    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

/// Binds an application to an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EnvBinding {
    pub app_primary_key: String,
    /// Environment name
    pub name: String,
    /// Name of the live resource deployed for this binding
    pub app_deploy_name: String,
}

impl Entity for EnvBinding {
    const KIND: &'static str = "env_binding";

    fn primary_key(&self) -> String {
        scoped_key(&self.app_primary_key, &self.name)
    }
}

impl AppScoped for EnvBinding {
    fn app_primary_key(&self) -> &str {
        &self.app_primary_key
    }
}

/// A trait attached to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTrait {
    #[serde(rename = "type")]
    pub trait_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// A component of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationComponent {
    pub app_primary_key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    /// Whether this is the application's main component
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub properties: serde_json::Value,
    #[serde(default)]
    pub traits: Vec<ComponentTrait>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Entity for ApplicationComponent {
    const KIND: &'static str = "application_component";

    fn primary_key(&self) -> String {
        scoped_key(&self.app_primary_key, &self.name)
    }
}

impl AppScoped for ApplicationComponent {
    fn app_primary_key(&self) -> &str {
        &self.app_primary_key
    }
}

/// A policy of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPolicy {
    pub app_primary_key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Entity for ApplicationPolicy {
    const KIND: &'static str = "application_policy";

    fn primary_key(&self) -> String {
        scoped_key(&self.app_primary_key, &self.name)
    }
}

impl AppScoped for ApplicationPolicy {
    fn app_primary_key(&self) -> &str {
        &self.app_primary_key
    }
}

/// One step of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// A workflow definition bound to an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub app_primary_key: String,
    pub name: String,
    pub env_name: String,
    /// Whether this is the default workflow of the application
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl Entity for Workflow {
    const KIND: &'static str = "workflow";

    fn primary_key(&self) -> String {
        scoped_key(&self.app_primary_key, &self.name)
    }
}

impl AppScoped for Workflow {
    fn app_primary_key(&self) -> &str {
        &self.app_primary_key
    }
}

/// Snapshot of one immutable version of the application spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRevision {
    pub app_primary_key: String,
    /// Synced revision identifier
    pub version: String,
    /// Name of the revision object on the cluster, if known
    #[serde(default)]
    pub revision_cr_name: String,
    pub env_name: String,
    pub workflow_name: String,
    /// sha256 of `apply_app_config`
    pub config_hash: String,
    /// The assembled spec, serialized
    pub apply_app_config: String,
}

impl Entity for ApplicationRevision {
    const KIND: &'static str = "application_revision";

    fn primary_key(&self) -> String {
        scoped_key(&self.app_primary_key, &self.version)
    }
}

impl AppScoped for ApplicationRevision {
    fn app_primary_key(&self) -> &str {
        &self.app_primary_key
    }
}

/// Status of one step in a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStepRecord {
    pub name: String,
    #[serde(default)]
    pub phase: String,
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub app_primary_key: String,
    /// Record name, usually the publish version
    pub name: String,
    pub workflow_name: String,
    /// Primary key of the revision this execution deployed
    #[serde(default)]
    pub revision_primary_key: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub steps: Vec<WorkflowStepRecord>,
}

impl Entity for WorkflowRecord {
    const KIND: &'static str = "workflow_record";

    fn primary_key(&self) -> String {
        scoped_key(&self.app_primary_key, &self.name)
    }
}

impl AppScoped for WorkflowRecord {
    fn app_primary_key(&self) -> &str {
        &self.app_primary_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_keys() {
        let binding = EnvBinding {
            app_primary_key: "web".to_string(),
            name: "syncd-prod".to_string(),
            app_deploy_name: "web".to_string(),
        };
        assert_eq!(binding.primary_key(), "web/syncd-prod");

        let record = WorkflowRecord {
            app_primary_key: "web-prod".to_string(),
            name: "v2".to_string(),
            workflow_name: "workflow-syncd-prod".to_string(),
            revision_primary_key: String::new(),
            phase: "succeeded".to_string(),
            finished: true,
            steps: vec![],
        };
        assert_eq!(record.primary_key(), "web-prod/v2");
    }

    #[test]
    fn test_scoped_keys_do_not_collide_across_owners() {
        // bare owner with a dashed name vs composed owner with a short name
        let bare = scoped_key("web", "prod-api");
        let composed = scoped_key("web-prod", "api");
        assert_ne!(bare, composed);
        assert_eq!(bare, "web/prod-api");
        assert_eq!(composed, "web-prod/api");
    }

    #[test]
    fn test_application_labels() {
        let app = ApplicationRecord::new("web").with_label(LABEL_SYNC_NAMESPACE, "prod");
        assert_eq!(app.sync_namespace(), Some("prod"));
        assert_eq!(app.source_of_truth(), None);
        assert_eq!(app.primary_key(), "web");
    }
}
