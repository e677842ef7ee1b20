//! Node selector matching for `NodeRemediationTemplate` → `Node`.
//!
//! A template selects a node when every key/value pair of its
//! `spec.nodeSelector` is present on the node's labels. An empty selector
//! selects every node.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

use crate::crd::NodeRemediationTemplate;

/// Whether `labels` carries every required key/value pair of `selector`.
pub fn matches(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Whether `template` wants a NodeRemediation on a node carrying `labels`.
pub fn template_selects(
    template: &NodeRemediationTemplate,
    labels: &BTreeMap<String, String>,
) -> bool {
    matches(&template.spec.node_selector, labels)
}

/// Whether `template` wants a NodeRemediation on `node`.
pub fn template_selects_node(template: &NodeRemediationTemplate, node: &Node) -> bool {
    template_selects(template, node.labels())
}
