//! NodeRemediation Custom Resource Definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// NodeRemediation resource specification
///
/// One NodeRemediation exists per (NodeRemediationTemplate, Node) pair. Its
/// spec is the template's spec payload plus the targeted node.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "nodeops.k8s.preferred.jp",
    version = "v1alpha1",
    kind = "NodeRemediation",
    plural = "noderemediations",
    singular = "noderemediation",
    shortname = "nr",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.nodeName"}"#,
    printcolumn = r#"{"name": "Operation Template", "type": "string", "jsonPath": ".spec.nodeOperationTemplateName"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeRemediationSpec {
    /// Payload copied from the owning template
    #[serde(flatten)]
    pub template: NodeRemediationSpecTemplate,

    /// Name of the node this remediation targets
    pub node_name: String,
}

/// Instance spec payload carried verbatim from a template to its instances
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeRemediationSpecTemplate {
    /// Node conditions that trigger the remediation
    #[serde(default)]
    pub rule: NodeRemediationRule,

    /// NodeOperationTemplate used to remediate the node
    #[serde(default)]
    pub node_operation_template_name: String,
}

/// Remediation rule
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeRemediationRule {
    /// All conditions must hold for the rule to fire
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<NodeConditionMatcher>,
}

/// Matches a single node condition by type and status
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct NodeConditionMatcher {
    /// Node condition type (e.g. Ready, MemoryPressure)
    #[serde(rename = "type")]
    pub type_: String,

    /// Expected condition status (True, False, Unknown)
    pub status: String,
}
