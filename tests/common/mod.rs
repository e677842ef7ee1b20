//! In-memory collaborators for driving the reconciler in tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::error::ErrorResponse;
use kube::runtime::events::EventType;
use kube::ResourceExt;

use node_remediation_operator::crd::{
    NodeRemediation, NodeRemediationSpecTemplate, NodeRemediationTemplate,
    NodeRemediationTemplateSpec, NodeRemediationTemplateTemplateSpec, TemplateMetadata,
};
use node_remediation_operator::error::{Error, Result};
use node_remediation_operator::index::owner_of;
use node_remediation_operator::reconcilers::remediation_template::ReconcileDeps;
use node_remediation_operator::store::{EventSink, RemediationStore};

// ============================================================================
// Builders
// ============================================================================

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn node(name: &str, node_labels: &[(&str, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels(node_labels)),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn payload(operation: &str) -> NodeRemediationSpecTemplate {
    NodeRemediationSpecTemplate {
        node_operation_template_name: operation.to_string(),
        ..Default::default()
    }
}

pub fn template(name: &str, selector: &[(&str, &str)]) -> NodeRemediationTemplate {
    let mut template = NodeRemediationTemplate::new(
        name,
        NodeRemediationTemplateSpec {
            node_selector: labels(selector),
            template: NodeRemediationTemplateTemplateSpec {
                metadata: TemplateMetadata::default(),
                spec: payload("reboot"),
            },
        },
    );
    template.metadata.uid = Some(format!("uid-{}", name));
    template
}

pub fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} (simulated)", reason),
        reason: reason.to_string(),
        code,
    }))
}

// ============================================================================
// Fake cluster
// ============================================================================

/// Store holding templates, nodes and NodeRemediations in memory.
///
/// Every mutating call is appended to `calls` as `"<verb>:<name>"`.
#[derive(Default)]
pub struct FakeCluster {
    pub templates: Mutex<BTreeMap<String, NodeRemediationTemplate>>,
    pub nodes: Mutex<Vec<Node>>,
    pub remediations: Mutex<BTreeMap<String, NodeRemediation>>,
    pub calls: Mutex<Vec<String>>,
    /// Reads of any kind
    pub reads: Mutex<usize>,
    pub fail_updates: AtomicBool,
    pub fail_deletes: AtomicBool,
    /// Remove on delete but answer NotFound, as if garbage collection won the race
    pub vanish_on_delete: AtomicBool,
    /// Persist creates but report a server error, as if the response was lost
    pub lose_create_responses: AtomicBool,
    /// Hide owned NodeRemediations, as if the owner index lagged behind
    pub stale_owner_listing: AtomicBool,
    pub node_list_delay: Mutex<Option<Duration>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, template: NodeRemediationTemplate) -> Self {
        self.put_template(template);
        self
    }

    pub fn with_nodes(self, nodes: Vec<Node>) -> Self {
        *self.nodes.lock().unwrap() = nodes;
        self
    }

    pub fn put_template(&self, template: NodeRemediationTemplate) {
        self.templates
            .lock()
            .unwrap()
            .insert(template.name_any(), template);
    }

    pub fn put_remediation(&self, remediation: NodeRemediation) {
        self.remediations
            .lock()
            .unwrap()
            .insert(remediation.name_any(), remediation);
    }

    pub fn set_nodes(&self, nodes: Vec<Node>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub fn remediation_list(&self) -> Vec<NodeRemediation> {
        self.remediations.lock().unwrap().values().cloned().collect()
    }

    pub fn remediation(&self, name: &str) -> Option<NodeRemediation> {
        self.remediations.lock().unwrap().get(name).cloned()
    }

    /// Node names targeted by NodeRemediations owned by `template`, sorted
    pub fn targets_of(&self, template: &str) -> Vec<String> {
        let mut targets: Vec<String> = self
            .remediation_list()
            .into_iter()
            .filter(|r| owner_of(r).as_deref() == Some(template))
            .map(|r| r.spec.node_name)
            .collect();
        targets.sort();
        targets
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_with(&self, verb: &str) -> Vec<String> {
        let prefix = format!("{}:", verb);
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(&prefix))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, verb: &str, name: &str) {
        self.calls.lock().unwrap().push(format!("{}:{}", verb, name));
    }

    fn read(&self) {
        *self.reads.lock().unwrap() += 1;
    }
}

#[async_trait]
impl RemediationStore for FakeCluster {
    async fn get_template(&self, name: &str) -> Result<Option<NodeRemediationTemplate>> {
        self.read();
        Ok(self.templates.lock().unwrap().get(name).cloned())
    }

    async fn list_owned_remediations(&self, template: &str) -> Result<Vec<NodeRemediation>> {
        self.read();
        if self.stale_owner_listing.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self
            .remediation_list()
            .into_iter()
            .filter(|r| owner_of(r).as_deref() == Some(template))
            .collect())
    }

    async fn get_remediation(&self, name: &str) -> Result<Option<NodeRemediation>> {
        self.read();
        Ok(self.remediation(name))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.read();
        let delay = *self.node_list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn create_remediation(&self, remediation: &NodeRemediation) -> Result<NodeRemediation> {
        let name = remediation.name_any();
        self.record("create", &name);

        let mut stored = self.remediations.lock().unwrap();
        if stored.contains_key(&name) {
            return Err(api_error(409, "AlreadyExists"));
        }
        stored.insert(name, remediation.clone());

        if self.lose_create_responses.load(Ordering::SeqCst) {
            return Err(api_error(504, "Timeout"));
        }
        Ok(remediation.clone())
    }

    async fn update_remediation(&self, remediation: &NodeRemediation) -> Result<NodeRemediation> {
        let name = remediation.name_any();
        self.record("update", &name);

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(api_error(500, "InternalError"));
        }
        let mut stored = self.remediations.lock().unwrap();
        if !stored.contains_key(&name) {
            return Err(api_error(404, "NotFound"));
        }
        stored.insert(name, remediation.clone());
        Ok(remediation.clone())
    }

    async fn delete_remediation(&self, remediation: &NodeRemediation) -> Result<()> {
        let name = remediation.name_any();
        self.record("delete", &name);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(api_error(500, "InternalError"));
        }
        let removed = self.remediations.lock().unwrap().remove(&name);
        if self.vanish_on_delete.load(Ordering::SeqCst) {
            return Err(api_error(404, "NotFound"));
        }
        match removed {
            Some(_) => Ok(()),
            None => Err(api_error(404, "NotFound")),
        }
    }
}

// ============================================================================
// Event sinks
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub template: String,
    pub type_: EventType,
    pub reason: String,
    pub message: String,
}

/// Keeps every recorded event
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn record(
        &self,
        template: &NodeRemediationTemplate,
        type_: EventType,
        reason: &str,
        message: String,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            template: template.name_any(),
            type_,
            reason: reason.to_string(),
            message,
        });
    }
}

/// Never finishes recording
pub struct HangingSink;

#[async_trait]
impl EventSink for HangingSink {
    async fn record(
        &self,
        _template: &NodeRemediationTemplate,
        _type_: EventType,
        _reason: &str,
        _message: String,
    ) {
        std::future::pending::<()>().await;
    }
}

pub fn deps<'a>(store: &'a FakeCluster, events: &'a dyn EventSink) -> ReconcileDeps<'a> {
    ReconcileDeps {
        store,
        events,
        call_timeout: Duration::from_secs(5),
    }
}
