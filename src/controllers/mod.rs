//! Kubernetes controllers for Node Remediation CRDs
//!
//! This module contains the controller implementations that watch for CRD changes
//! and trigger reconciliation.

mod remediation_template_controller;

pub use remediation_template_controller::{
    maintain_owner_index, requeue_after, run as run_remediation_template_controller,
};

use std::time::Duration;

use kube::Client;

use crate::config::OperatorConfig;
use crate::index::OwnerIndex;
use crate::reconcilers::remediation_template::ReconcileDeps;
use crate::store::{KubeEventSink, KubeStore};

/// Shared context for all controllers
///
/// Built once at startup and only read afterwards.
pub struct Context {
    /// NodeRemediation owner index
    pub index: OwnerIndex,
    /// Object store used by reconciles
    pub store: KubeStore,
    /// Event sink used by reconciles
    pub events: KubeEventSink,
    /// Upper bound for each Kubernetes API call made during a reconcile
    pub call_timeout: Duration,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: &OperatorConfig) -> Self {
        let index = OwnerIndex::new();
        Self {
            store: KubeStore::new(client.clone(), index.clone()),
            events: KubeEventSink::new(client, &config.reporter),
            index,
            call_timeout: config.call_timeout(),
        }
    }

    /// Dependencies handed to a single reconcile call
    pub fn deps(&self) -> ReconcileDeps<'_> {
        ReconcileDeps {
            store: &self.store,
            events: &self.events,
            call_timeout: self.call_timeout,
        }
    }
}
