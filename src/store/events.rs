//! [`EventSink`] publishing Kubernetes events

use async_trait::async_trait;
use kube::{
    runtime::events::{Event, EventType, Recorder, Reporter},
    Client, Resource, ResourceExt,
};
use tracing::warn;

use super::EventSink;
use crate::crd::NodeRemediationTemplate;

/// Publishes events through the kube-runtime [`Recorder`]
#[derive(Clone)]
pub struct KubeEventSink {
    client: Client,
    reporter: Reporter,
}

impl KubeEventSink {
    /// Create a sink reporting as `controller`
    pub fn new(client: Client, controller: &str) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: controller.to_string(),
                instance: std::env::var("POD_NAME").ok(),
            },
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn record(
        &self,
        template: &NodeRemediationTemplate,
        type_: EventType,
        reason: &str,
        message: String,
    ) {
        let recorder = Recorder::new(
            self.client.clone(),
            self.reporter.clone(),
            template.object_ref(&()),
        );

        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(message),
            action: "Reconcile".to_string(),
            secondary: None,
        };

        if let Err(e) = recorder.publish(event).await {
            warn!(
                template = %template.name_any(),
                reason = reason,
                error = %e,
                "Failed to publish event"
            );
        }
    }
}
