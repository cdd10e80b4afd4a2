//! The live `Application` custom resource.
//!
//! Read-only to the synchronizer. Field names follow the cluster API
//! (camelCase) so manifests can be decoded from YAML or JSON directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labels::{ANNOTATION_APP_NAME, ANNOTATION_PUBLISH_VERSION};

/// Object metadata of a live resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub generation: i64,
}

/// A component declared in the application spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    #[serde(default)]
    pub traits: Vec<TraitSpec>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A trait declared on a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitSpec {
    #[serde(rename = "type")]
    pub trait_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// A policy declared in the application spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// A workflow step declared in the application spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// The declared workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub steps: Vec<WorkflowStepSpec>,
}

/// Desired state of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub policies: Vec<PolicySpec>,
    #[serde(default)]
    pub workflow: Option<WorkflowSpec>,
}

/// The latest revision the cluster controller produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestRevision {
    pub name: String,
    #[serde(default)]
    pub revision: i64,
    #[serde(default)]
    pub revision_hash: String,
}

/// Status of one executed workflow step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepStatus {
    pub name: String,
    #[serde(default)]
    pub phase: String,
}

/// Status of the workflow run for the current revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    /// Revision marker, e.g. `web-v3:abc123`
    #[serde(default)]
    pub app_revision: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub steps: Vec<WorkflowStepStatus>,
}

/// Observed state of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default)]
    pub latest_revision: Option<LatestRevision>,
    #[serde(default)]
    pub workflow: Option<WorkflowStatus>,
}

/// The live `Application` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ApplicationSpec,
    #[serde(default)]
    pub status: ApplicationStatus,
}

impl Application {
    /// Create a resource with the given identity and an empty spec.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Builder: set an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// Builder: set a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Builder: add a component.
    pub fn with_component(mut self, component: ComponentSpec) -> Self {
        self.spec.components.push(component);
        self
    }

    /// Builder: add a policy.
    pub fn with_policy(mut self, policy: PolicySpec) -> Self {
        self.spec.policies.push(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Look up an annotation, treating empty values as absent.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look up a label, treating empty values as absent.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Catalog primary key carried by the application-name annotation.
    pub fn app_name_annotation(&self) -> Option<&str> {
        self.annotation(ANNOTATION_APP_NAME)
    }

    /// The publish version, if annotated.
    pub fn publish_version(&self) -> Option<&str> {
        self.annotation(ANNOTATION_PUBLISH_VERSION)
    }

    /// Workflow record name derived from the status revision marker.
    ///
    /// The first `:` is replaced with `-`, so `web-v3:abc` becomes `web-v3-abc`.
    pub fn status_record_name(&self) -> Option<String> {
        self.status
            .workflow
            .as_ref()
            .map(|w| w.app_revision.as_str())
            .filter(|r| !r.is_empty())
            .map(|r| r.replacen(':', "-", 1))
    }

    /// Name of the workflow record for the current rollout.
    ///
    /// Publish version first, then the status revision marker.
    pub fn record_name(&self) -> Option<String> {
        self.publish_version()
            .map(str::to_string)
            .or_else(|| self.status_record_name())
    }

    /// Revision identifier a full sync of this resource would record.
    ///
    /// Publish version first, then the latest revision name.
    pub fn synced_revision(&self) -> Option<String> {
        self.publish_version().map(str::to_string).or_else(|| {
            self.status
                .latest_revision
                .as_ref()
                .map(|r| r.name.clone())
                .filter(|n| !n.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_name_fallbacks() {
        let app = Application::new("web", "prod").with_annotation(ANNOTATION_PUBLISH_VERSION, "v2");
        assert_eq!(app.record_name().as_deref(), Some("v2"));

        let mut app = Application::new("web", "prod");
        assert_eq!(app.record_name(), None);

        app.status.workflow = Some(WorkflowStatus {
            app_revision: "web-v3:abc:def".to_string(),
            ..Default::default()
        });
        assert_eq!(app.record_name().as_deref(), Some("web-v3-abc:def"));
    }

    #[test]
    fn test_empty_annotation_is_absent() {
        let app = Application::new("web", "prod").with_annotation(ANNOTATION_APP_NAME, "");
        assert_eq!(app.app_name_annotation(), None);
    }

    #[test]
    fn test_decode_manifest() {
        let yaml = r#"
metadata:
  name: web
  namespace: prod
  annotations:
    app.oam.dev/publishVersion: v2
spec:
  components:
    - name: frontend
      type: webservice
      properties:
        image: nginx
      dependsOn: [db]
status:
  latestRevision:
    name: web-v1
    revision: 1
"#;
        let app: Application = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(app.name(), "web");
        assert_eq!(app.spec.components[0].depends_on, vec!["db".to_string()]);
        assert_eq!(app.synced_revision().as_deref(), Some("v2"));
        assert_eq!(app.status.latest_revision.unwrap().revision, 1);
    }
}
