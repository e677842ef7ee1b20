//! NodeRemediationTemplate Custom Resource Definition

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::NodeRemediationSpecTemplate;

/// NodeRemediationTemplate resource specification
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "nodeops.k8s.preferred.jp",
    version = "v1alpha1",
    kind = "NodeRemediationTemplate",
    plural = "noderemediationtemplates",
    singular = "noderemediationtemplate",
    shortname = "nrt",
    printcolumn = r#"{"name": "Operation Template", "type": "string", "jsonPath": ".spec.template.spec.nodeOperationTemplateName"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeRemediationTemplateSpec {
    /// Labels a node must carry to get a NodeRemediation (empty = every node)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Blueprint for the per-node NodeRemediations
    pub template: NodeRemediationTemplateTemplateSpec,
}

/// Blueprint of a NodeRemediation
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeRemediationTemplateTemplateSpec {
    /// Metadata applied to every NodeRemediation
    #[serde(default)]
    pub metadata: TemplateMetadata,

    /// Spec payload copied into every NodeRemediation
    pub spec: NodeRemediationSpecTemplate,
}

/// Metadata fragment of the blueprint
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    /// Fixed instance name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Prefix for generated instance names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    /// Labels merged into every instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations merged into every instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}
