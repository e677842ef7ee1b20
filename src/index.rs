//! Owner index: NodeRemediationTemplate name → owned NodeRemediations.
//!
//! kube-rs reflector stores only support lookups by object key, so this
//! module keeps its own reverse index, fed from a `watcher` stream on
//! NodeRemediation. Attribution is decided by [`owner_of`], which reads the
//! controller owner reference recorded when the instance was created.
//!
//! Alongside the owner map the index keeps a node name → owners map so the
//! node event router can find templates that still have an instance on a
//! node whose labels no longer match.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use tokio::sync::watch;

use crate::crd::{NodeRemediation, NodeRemediationTemplate};
use crate::metrics;

/// Name of the template controlling `remediation`, if any.
///
/// Only a controller reference (`controller: true`) whose apiVersion and
/// kind are exactly those of `NodeRemediationTemplate` counts. Anything else
/// means the instance is not owned by a template.
pub fn owner_of(remediation: &NodeRemediation) -> Option<String> {
    let owner = remediation
        .owner_references()
        .iter()
        .find(|owner| owner.controller == Some(true))?;

    if owner.api_version != NodeRemediationTemplate::api_version(&())
        || owner.kind != NodeRemediationTemplate::kind(&())
    {
        return None;
    }

    Some(owner.name.clone())
}

struct Attribution {
    owner: String,
    node: String,
}

#[derive(Default)]
struct Entries {
    attribution: HashMap<String, Attribution>,
    by_owner: HashMap<String, BTreeMap<String, NodeRemediation>>,
    by_node: HashMap<String, BTreeMap<String, String>>,
}

impl Entries {
    fn upsert(&mut self, remediation: NodeRemediation) {
        let name = remediation.name_any();
        // The owner or node may have changed since the last observation.
        self.remove(&name);

        let Some(owner) = owner_of(&remediation) else {
            return;
        };
        let node = remediation.spec.node_name.clone();

        self.by_node
            .entry(node.clone())
            .or_default()
            .insert(name.clone(), owner.clone());
        self.by_owner
            .entry(owner.clone())
            .or_default()
            .insert(name.clone(), remediation);
        self.attribution.insert(name, Attribution { owner, node });
    }

    fn remove(&mut self, name: &str) {
        let Some(attribution) = self.attribution.remove(name) else {
            return;
        };

        if let Some(children) = self.by_owner.get_mut(&attribution.owner) {
            children.remove(name);
            if children.is_empty() {
                self.by_owner.remove(&attribution.owner);
            }
        }
        if let Some(owners) = self.by_node.get_mut(&attribution.node) {
            owners.remove(name);
            if owners.is_empty() {
                self.by_node.remove(&attribution.node);
            }
        }
    }

    fn len(&self) -> usize {
        self.attribution.len()
    }
}

#[derive(Default)]
struct Inner {
    current: Entries,
    /// Buffer filled between `Init` and `InitDone` of a relist
    relisting: Option<Entries>,
}

/// Shared, incrementally maintained owner index.
///
/// Cloning is cheap; all clones see the same data.
#[derive(Clone)]
pub struct OwnerIndex {
    inner: Arc<RwLock<Inner>>,
    ready: Arc<watch::Sender<bool>>,
}

impl Default for OwnerIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerIndex {
    /// Create an empty index that is not yet ready
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            ready: Arc::new(ready),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one watcher event.
    ///
    /// A relist (`Init` .. `InitDone`) is buffered and swapped in as a whole,
    /// so readers never observe a half-populated index.
    pub fn apply_event(&self, event: &watcher::Event<NodeRemediation>) {
        let mut guard = self.write();
        let inner = &mut *guard;

        match event {
            watcher::Event::Init => {
                inner.relisting = Some(Entries::default());
            }
            watcher::Event::InitApply(remediation) => match inner.relisting.as_mut() {
                Some(buffer) => buffer.upsert(remediation.clone()),
                None => inner.current.upsert(remediation.clone()),
            },
            watcher::Event::InitDone => {
                if let Some(buffer) = inner.relisting.take() {
                    inner.current = buffer;
                }
                self.ready.send_replace(true);
            }
            watcher::Event::Apply(remediation) => inner.current.upsert(remediation.clone()),
            watcher::Event::Delete(remediation) => inner.current.remove(&remediation.name_any()),
        }

        metrics::OWNER_INDEX_SIZE.set(inner.current.len() as f64);
    }

    /// Record an object the operator itself just wrote
    pub fn upsert(&self, remediation: NodeRemediation) {
        let mut inner = self.write();
        inner.current.upsert(remediation);
        metrics::OWNER_INDEX_SIZE.set(inner.current.len() as f64);
    }

    /// Forget an object the operator itself just deleted
    pub fn remove(&self, name: &str) {
        let mut inner = self.write();
        inner.current.remove(name);
        metrics::OWNER_INDEX_SIZE.set(inner.current.len() as f64);
    }

    /// NodeRemediations controlled by `template`, ordered by name
    pub fn owned_by(&self, template: &str) -> Vec<NodeRemediation> {
        self.read()
            .current
            .by_owner
            .get(template)
            .map(|children| children.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Templates owning at least one NodeRemediation that targets `node`
    pub fn templates_targeting(&self, node: &str) -> Vec<String> {
        self.read()
            .current
            .by_node
            .get(node)
            .map(|owners| {
                owners
                    .values()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of attributed NodeRemediations
    pub fn len(&self) -> usize {
        self.read().current.len()
    }

    /// Whether the index holds no attributed NodeRemediations
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the initial list has completed
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the initial list has completed
    pub async fn wait_until_ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives as long as `self`, so this only returns once ready.
        let _ = ready.wait_for(|ready| *ready).await;
    }
}
