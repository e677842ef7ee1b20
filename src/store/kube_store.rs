//! [`RemediationStore`] backed by the Kubernetes API and the owner index

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    Api, Client, ResourceExt,
};
use tracing::debug;

use super::RemediationStore;
use crate::crd::{NodeRemediation, NodeRemediationTemplate};
use crate::error::{Error, Result};
use crate::index::OwnerIndex;

/// Kubernetes-backed store
///
/// Owned NodeRemediations are served from the [`OwnerIndex`]; successful
/// creates and deletes are written back into it so the next reconcile sees
/// them even before the watch event arrives.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    index: OwnerIndex,
}

impl KubeStore {
    /// Create a store over `client` reading owned objects from `index`
    pub fn new(client: Client, index: OwnerIndex) -> Self {
        Self { client, index }
    }

    fn templates(&self) -> Api<NodeRemediationTemplate> {
        Api::all(self.client.clone())
    }

    fn remediations(&self) -> Api<NodeRemediation> {
        Api::all(self.client.clone())
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl RemediationStore for KubeStore {
    async fn get_template(&self, name: &str) -> Result<Option<NodeRemediationTemplate>> {
        Ok(self.templates().get_opt(name).await?)
    }

    async fn list_owned_remediations(&self, template: &str) -> Result<Vec<NodeRemediation>> {
        self.index.wait_until_ready().await;
        Ok(self.index.owned_by(template))
    }

    async fn get_remediation(&self, name: &str) -> Result<Option<NodeRemediation>> {
        Ok(self.remediations().get_opt(name).await?)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self.nodes().list(&ListParams::default()).await?;
        Ok(nodes.items)
    }

    async fn create_remediation(&self, remediation: &NodeRemediation) -> Result<NodeRemediation> {
        let created = self
            .remediations()
            .create(&PostParams::default(), remediation)
            .await?;
        self.index.upsert(created.clone());
        Ok(created)
    }

    async fn update_remediation(&self, remediation: &NodeRemediation) -> Result<NodeRemediation> {
        let name = remediation
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::missing_field("NodeRemediation metadata.name"))?;
        let updated = self
            .remediations()
            .replace(name, &PostParams::default(), remediation)
            .await?;
        self.index.upsert(updated.clone());
        Ok(updated)
    }

    async fn delete_remediation(&self, remediation: &NodeRemediation) -> Result<()> {
        let name = remediation.name_any();
        let result = self
            .remediations()
            .delete(&name, &DeleteParams::background())
            .await
            .map_err(Error::from);

        match result {
            Ok(_) => {
                self.index.remove(&name);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(name = %name, "NodeRemediation already gone");
                self.index.remove(&name);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
