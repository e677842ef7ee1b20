//! Node event routing: `Node` → `NodeRemediationTemplate` reconcile triggers.
//!
//! The controller's node watch calls [`templates_for_node`] for every node
//! change. It yields every template whose selector matches the node's
//! current labels, plus every template that still owns a NodeRemediation on
//! that node. The second set covers nodes whose labels moved away from a
//! selector, which the selector scan alone cannot see.
//!
//! Templates are scanned in full on every node event. Template counts are
//! expected to stay small; a selector-key index would replace the scan if
//! they grow.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Node;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;

use crate::crd::NodeRemediationTemplate;
use crate::index::OwnerIndex;
use crate::metrics;
use crate::selector::template_selects_node;

/// Names of templates to reconcile after a change to `node`, sorted and
/// de-duplicated.
pub fn template_names_for_node<'a>(
    templates: impl IntoIterator<Item = &'a NodeRemediationTemplate>,
    node: &Node,
    index: &OwnerIndex,
) -> Vec<String> {
    let mut names: BTreeSet<String> = templates
        .into_iter()
        .filter(|template| template_selects_node(template, node))
        .map(|template| template.name_any())
        .collect();

    names.extend(index.templates_targeting(&node.name_any()));
    names.into_iter().collect()
}

/// Reconcile triggers for a change to `node`, read from the template cache.
pub fn templates_for_node(
    store: &Store<NodeRemediationTemplate>,
    node: &Node,
    index: &OwnerIndex,
) -> Vec<ObjectRef<NodeRemediationTemplate>> {
    let templates = store.state();
    let names = template_names_for_node(templates.iter().map(|t| &**t), node, index);

    let outcome = if names.is_empty() { "ignored" } else { "triggered" };
    metrics::NODE_EVENTS_ROUTED.with_label_values(&[outcome]).inc();

    names.iter().map(|name| ObjectRef::new(name)).collect()
}
