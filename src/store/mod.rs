//! Collaborators of the reconcile engine
//!
//! The engine reads and writes cluster state only through
//! [`RemediationStore`] and reports operator-visible notifications only
//! through [`EventSink`]. Production code uses the kube-backed
//! implementations; tests substitute in-memory fakes.

mod events;
mod kube_store;

pub use events::KubeEventSink;
pub use kube_store::KubeStore;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::events::EventType;

use crate::crd::{NodeRemediation, NodeRemediationTemplate};
use crate::error::Result;

/// Object store consumed by the reconcile engine
#[async_trait]
pub trait RemediationStore: Send + Sync {
    /// Fetch a template by name; `Ok(None)` when it does not exist
    async fn get_template(&self, name: &str) -> Result<Option<NodeRemediationTemplate>>;

    /// NodeRemediations controlled by the named template
    async fn list_owned_remediations(&self, template: &str) -> Result<Vec<NodeRemediation>>;

    /// Fetch a NodeRemediation by name; `Ok(None)` when it does not exist
    async fn get_remediation(&self, name: &str) -> Result<Option<NodeRemediation>>;

    /// Every node in the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Create a NodeRemediation, returning the stored object
    async fn create_remediation(&self, remediation: &NodeRemediation) -> Result<NodeRemediation>;

    /// Replace a NodeRemediation, returning the stored object
    async fn update_remediation(&self, remediation: &NodeRemediation) -> Result<NodeRemediation>;

    /// Delete a NodeRemediation
    async fn delete_remediation(&self, remediation: &NodeRemediation) -> Result<()>;
}

/// Sink for Kubernetes events attached to a template.
///
/// Recording is fire-and-forget: implementations log failures instead of
/// returning them.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(
        &self,
        template: &NodeRemediationTemplate,
        type_: EventType,
        reason: &str,
        message: String,
    );
}
