//! NodeRemediationTemplate controller
//!
//! Watches NodeRemediationTemplates, the NodeRemediations they own and
//! cluster Nodes, and triggers reconciliation of the affected templates.

use std::sync::Arc;
use std::time::Duration;

use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        watcher::{self, Config as WatcherConfig},
        WatchStreamExt,
    },
    Api, Client, ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::controllers::Context;
use crate::crd::{NodeRemediation, NodeRemediationTemplate};
use crate::error::{Error, Result};
use crate::index::OwnerIndex;
use crate::metrics;
use crate::reconcilers::remediation_template::{self as template_reconciler, ReconcileOutcome};
use crate::router;

/// Metrics label for this controller
const KIND: &str = "NodeRemediationTemplate";

/// Run the NodeRemediationTemplate controller
pub async fn run(client: Client, context: Arc<Context>) {
    let templates: Api<NodeRemediationTemplate> = Api::all(client.clone());
    let remediations: Api<NodeRemediation> = Api::all(client.clone());
    let nodes: Api<Node> = Api::all(client);

    // Verify CRDs are installed
    if let Err(e) = templates.list(&ListParams::default().limit(1)).await {
        error!("NodeRemediationTemplate CRD not installed: {}", e);
        return;
    }
    if let Err(e) = remediations.list(&ListParams::default().limit(1)).await {
        error!("NodeRemediation CRD not installed: {}", e);
        return;
    }

    info!("Starting NodeRemediationTemplate controller");

    let index_task = maintain_owner_index(remediations.clone(), context.index.clone());

    let controller = Controller::new(templates, WatcherConfig::default());
    let template_store = controller.store();
    let index = context.index.clone();

    let controller_task = controller
        .owns(remediations, WatcherConfig::default())
        .watches(nodes, WatcherConfig::default(), move |node| {
            router::templates_for_node(&template_store, &node, &index)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(name = %obj.name, "Reconciled NodeRemediationTemplate");
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS.with_label_values(&[KIND]).inc();
                }
            }
        });

    tokio::select! {
        _ = controller_task => {}
        _ = index_task => {
            error!("NodeRemediation owner index watch exited unexpectedly");
        }
    }
}

/// Feed `index` from a watch on all NodeRemediations
pub async fn maintain_owner_index(api: Api<NodeRemediation>, index: OwnerIndex) {
    watcher::watcher(api, WatcherConfig::default())
        .default_backoff()
        .for_each(|event| {
            match event {
                Ok(event) => index.apply_event(&event),
                Err(e) => warn!(error = %e, "NodeRemediation watch error"),
            }
            future::ready(())
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(obj, ctx), fields(name = %obj.name_any()))]
async fn reconcile(obj: Arc<NodeRemediationTemplate>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[KIND])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[KIND]).inc();

    let deps = ctx.deps();
    match template_reconciler::reconcile(&obj.name_any(), &deps).await? {
        ReconcileOutcome::TemplateGone => {
            debug!("NodeRemediationTemplate deleted before reconcile");
        }
        ReconcileOutcome::Converged {
            created,
            updated,
            deleted,
        } => {
            debug!(created, updated, deleted, "NodeRemediations converged");
        }
    }

    // Node and NodeRemediation watches re-trigger; no periodic requeue.
    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(obj: Arc<NodeRemediationTemplate>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    error!(
        name = %name,
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    Action::requeue(requeue_after(error))
}

/// Retry delay for a failed reconcile, by error type
pub fn requeue_after(error: &Error) -> Duration {
    match error {
        Error::Kube(_) => Duration::from_secs(30),
        Error::Timeout(_) => Duration::from_secs(15),
        Error::NameConflict { .. } | Error::MissingField(_) | Error::Config(_) => {
            Duration::from_secs(300)
        }
        _ => Duration::from_secs(30),
    }
}
