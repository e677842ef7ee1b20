//! NodeRemediationTemplate reconciler
//!
//! Expands a template into one NodeRemediation per matching node:
//! - Fetch the template, its owned NodeRemediations and every node
//! - Plan creates, updates and deletes against the selector
//! - Apply the plan through the [`RemediationStore`]

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::crd::{NodeRemediation, NodeRemediationSpec, NodeRemediationTemplate};
use crate::error::{Error, Result};
use crate::index::owner_of;
use crate::metrics;
use crate::selector::template_selects_node;
use crate::store::{EventSink, RemediationStore};

/// Event reason recorded on the template for every created NodeRemediation
pub const CREATED_REASON: &str = "CreatedRemediation";

/// Longest object name the API server accepts
const MAX_NAME_LEN: usize = 253;

/// Hex characters appended to generated names
const NAME_SUFFIX_LEN: usize = 10;

/// Dependencies of a single reconcile call
pub struct ReconcileDeps<'a> {
    /// Object store
    pub store: &'a dyn RemediationStore,
    /// Event sink for operator-visible notifications
    pub events: &'a dyn EventSink,
    /// Upper bound for each store call
    pub call_timeout: Duration,
}

/// Result of a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The template no longer exists; nothing was done
    TemplateGone,
    /// The instance set was brought in line with the template
    Converged {
        created: usize,
        updated: usize,
        deleted: usize,
    },
}

/// A write to apply for a matching node
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedWrite {
    /// The node has no NodeRemediation yet
    Create(NodeRemediation),
    /// The node's NodeRemediation with the blueprint merged in
    Update(NodeRemediation),
}

/// Changes needed to converge one template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Creates and updates, in node order
    pub writes: Vec<PlannedWrite>,
    /// Owned NodeRemediations that must go
    pub deletes: Vec<NodeRemediation>,
}

impl ReconcilePlan {
    /// NodeRemediations to create
    pub fn creates(&self) -> impl Iterator<Item = &NodeRemediation> {
        self.writes.iter().filter_map(|write| match write {
            PlannedWrite::Create(remediation) => Some(remediation),
            PlannedWrite::Update(_) => None,
        })
    }

    /// NodeRemediations to update
    pub fn updates(&self) -> impl Iterator<Item = &NodeRemediation> {
        self.writes.iter().filter_map(|write| match write {
            PlannedWrite::Update(remediation) => Some(remediation),
            PlannedWrite::Create(_) => None,
        })
    }
}

/// Reconcile the template called `name`
#[instrument(skip(deps), fields(template = %name))]
pub async fn reconcile(name: &str, deps: &ReconcileDeps<'_>) -> Result<ReconcileOutcome> {
    let Some(template) = bounded(
        deps.call_timeout,
        "get NodeRemediationTemplate",
        deps.store.get_template(name),
    )
    .await?
    else {
        // Owned NodeRemediations are garbage collected through their owner reference.
        debug!("NodeRemediationTemplate not found, nothing to do");
        return Ok(ReconcileOutcome::TemplateGone);
    };

    let owned = bounded(
        deps.call_timeout,
        "list owned NodeRemediations",
        deps.store.list_owned_remediations(name),
    )
    .await?;

    let nodes = bounded(deps.call_timeout, "list Nodes", deps.store.list_nodes()).await?;

    let plan = plan(&template, owned, &nodes)?;
    debug!(
        creates = plan.creates().count(),
        updates = plan.updates().count(),
        deletes = plan.deletes.len(),
        "Planned NodeRemediation changes"
    );

    let mut created = 0;
    let mut updated = 0;
    let mut deleted = 0;

    for write in plan.writes {
        match write {
            PlannedWrite::Create(remediation) => {
                if create_remediation(&template, remediation, deps).await? {
                    created += 1;
                }
            }
            PlannedWrite::Update(remediation) => {
                bounded(
                    deps.call_timeout,
                    "update NodeRemediation",
                    deps.store.update_remediation(&remediation),
                )
                .await?;
                metrics::REMEDIATIONS_UPDATED.with_label_values(&[name]).inc();
                updated += 1;
            }
        }
    }

    for remediation in plan.deletes {
        let remediation_name = remediation.name_any();
        match bounded(
            deps.call_timeout,
            "delete NodeRemediation",
            deps.store.delete_remediation(&remediation),
        )
        .await
        {
            Ok(()) => {
                info!(
                    remediation = %remediation_name,
                    node = %remediation.spec.node_name,
                    "Deleted NodeRemediation"
                );
                metrics::REMEDIATIONS_DELETED.with_label_values(&[name]).inc();
                deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                debug!(remediation = %remediation_name, "NodeRemediation already deleted");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(ReconcileOutcome::Converged {
        created,
        updated,
        deleted,
    })
}

/// Compute the changes that converge `template` given its owned
/// NodeRemediations and the current nodes.
///
/// When several owned NodeRemediations target the same node, the one with
/// the lexicographically smallest name is kept and the others are deleted.
pub fn plan(
    template: &NodeRemediationTemplate,
    mut owned: Vec<NodeRemediation>,
    nodes: &[Node],
) -> Result<ReconcilePlan> {
    owned.sort_by_key(|remediation| remediation.name_any());

    let mut plan = ReconcilePlan::default();
    let mut by_node: BTreeMap<String, NodeRemediation> = BTreeMap::new();
    for remediation in owned {
        let node_name = remediation.spec.node_name.clone();
        if by_node.contains_key(&node_name) {
            warn!(
                remediation = %remediation.name_any(),
                node = %node_name,
                "Duplicate NodeRemediation for node, deleting"
            );
            plan.deletes.push(remediation);
        } else {
            by_node.insert(node_name, remediation);
        }
    }

    let owner = template.controller_owner_ref(&());
    for node in nodes {
        let node_name = node.name_any();
        if !template_selects_node(template, node) {
            continue;
        }

        match by_node.remove(&node_name) {
            Some(existing) => {
                plan.writes
                    .push(PlannedWrite::Update(merge_blueprint(template, existing)));
            }
            None => {
                let owner = owner
                    .as_ref()
                    .ok_or_else(|| Error::missing_field("NodeRemediationTemplate metadata.uid"))?;
                plan.writes.push(PlannedWrite::Create(build_remediation(
                    template, &node_name, owner,
                )));
            }
        }
    }

    plan.deletes.extend(by_node.into_values());
    Ok(plan)
}

/// Merge the blueprint into an existing NodeRemediation.
///
/// Labels and annotations are merged additively: keys dropped from the
/// blueprint stay on the instance. The spec payload is replaced wholesale
/// while the node target is kept.
pub fn merge_blueprint(
    template: &NodeRemediationTemplate,
    mut remediation: NodeRemediation,
) -> NodeRemediation {
    let blueprint = &template.spec.template;

    remediation
        .labels_mut()
        .extend(blueprint.metadata.labels.clone());
    remediation
        .annotations_mut()
        .extend(blueprint.metadata.annotations.clone());
    remediation.spec.template = blueprint.spec.clone();

    remediation
}

/// Build a new NodeRemediation for `node_name` from the blueprint
pub fn build_remediation(
    template: &NodeRemediationTemplate,
    node_name: &str,
    owner: &OwnerReference,
) -> NodeRemediation {
    let blueprint = &template.spec.template;
    let labels = &blueprint.metadata.labels;
    let annotations = &blueprint.metadata.annotations;

    NodeRemediation {
        metadata: ObjectMeta {
            name: Some(remediation_name(template, node_name)),
            labels: (!labels.is_empty()).then(|| labels.clone()),
            annotations: (!annotations.is_empty()).then(|| annotations.clone()),
            owner_references: Some(vec![owner.clone()]),
            ..Default::default()
        },
        spec: NodeRemediationSpec {
            template: blueprint.spec.clone(),
            node_name: node_name.to_string(),
        },
    }
}

/// Name of the NodeRemediation `template` creates for `node_name`.
///
/// A fixed blueprint name is used verbatim. Otherwise the name is a prefix
/// (blueprint `generateName`, or `<template>-<node>-`) followed by a suffix
/// hashed from the template uid and node name, so a retried create asks for
/// the same name.
pub fn remediation_name(template: &NodeRemediationTemplate, node_name: &str) -> String {
    let metadata = &template.spec.template.metadata;
    if let Some(name) = metadata.name.as_deref().filter(|name| !name.is_empty()) {
        return name.to_string();
    }

    let mut prefix = match metadata.generate_name.as_deref().filter(|p| !p.is_empty()) {
        Some(prefix) => prefix.to_string(),
        None => format!("{}-{}-", template.name_any(), node_name),
    };
    truncate_to_boundary(&mut prefix, MAX_NAME_LEN - NAME_SUFFIX_LEN);

    let uid = template.meta().uid.as_deref().unwrap_or_default();
    format!("{}{}", prefix, name_suffix(uid, node_name))
}

fn name_suffix(template_uid: &str, node_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template_uid.as_bytes());
    hasher.update([0u8]);
    hasher.update(node_name.as_bytes());
    hasher
        .finalize()
        .iter()
        .take(NAME_SUFFIX_LEN / 2)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

fn truncate_to_boundary(value: &mut String, max_len: usize) {
    if value.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
}

/// Create one NodeRemediation; `Ok(false)` when an earlier attempt already did.
async fn create_remediation(
    template: &NodeRemediationTemplate,
    remediation: NodeRemediation,
    deps: &ReconcileDeps<'_>,
) -> Result<bool> {
    let template_name = template.name_any();
    let name = remediation.name_any();

    match bounded(
        deps.call_timeout,
        "create NodeRemediation",
        deps.store.create_remediation(&remediation),
    )
    .await
    {
        Ok(created) => {
            let created_name = created.name_any();
            info!(
                remediation = %created_name,
                node = %created.spec.node_name,
                "Created NodeRemediation"
            );
            metrics::REMEDIATIONS_CREATED
                .with_label_values(&[template_name.as_str()])
                .inc();

            let message = format!("Created a NodeRemediation \"{}\"", created_name);
            let record = deps
                .events
                .record(template, EventType::Normal, CREATED_REASON, message);
            if tokio::time::timeout(deps.call_timeout, record).await.is_err() {
                warn!(remediation = %created_name, "Timed out publishing event");
            }
            Ok(true)
        }
        Err(e) if e.is_already_exists() => {
            let existing = bounded(
                deps.call_timeout,
                "get NodeRemediation",
                deps.store.get_remediation(&name),
            )
            .await?;

            match existing {
                Some(existing)
                    if owner_of(&existing).as_deref() == Some(template_name.as_str())
                        && existing.spec.node_name == remediation.spec.node_name =>
                {
                    info!(remediation = %name, "NodeRemediation already created by an earlier attempt");
                    Ok(false)
                }
                _ => Err(Error::NameConflict {
                    name,
                    template: template_name,
                }),
            }
        }
        Err(e) => Err(e),
    }
}

async fn bounded<T>(
    limit: Duration,
    op: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::timeout(op))?
}
