//! Tree-shaped set of out-of-sync resources

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use sync_model::{Depth, ResourcePath, SyncState};

use crate::delta::{SyncSetDelta, SyncSetListener};

/// A node exists while its resource is out of sync or has out-of-sync
/// descendants.
#[derive(Debug, Default)]
struct Node {
    state: Option<SyncState>,
    /// Out-of-sync resources strictly below this node
    descendants: usize,
    children: BTreeSet<ResourcePath>,
}

#[derive(Debug, Default)]
struct TreeState {
    nodes: HashMap<ResourcePath, Node>,
}

#[derive(Debug)]
enum Op {
    Upsert(SyncState),
    Remove(ResourcePath),
    RemoveSubtree(ResourcePath),
}

/// The synchronization state container.
///
/// Queries are answered from the last committed batch at any time. All
/// mutation goes through a [`Batch`], and at most one batch is open at a
/// time: [`SyncTree::begin_batch`] blocks while another producer holds one.
#[derive(Default)]
pub struct SyncTree {
    batch_lock: Mutex<()>,
    state: RwLock<TreeState>,
    listeners: RwLock<Vec<Arc<dyn SyncSetListener>>>,
}

/// A transactional group of mutations.
///
/// Mutations are staged and applied when the batch ends (on [`Batch::end`]
/// or drop). Listeners then receive one delta for the whole batch.
pub struct Batch<'a> {
    tree: &'a SyncTree,
    ops: Vec<Op>,
    _section: MutexGuard<'a, ()>,
}

impl SyncTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for committed batches.
    pub fn add_listener(&self, listener: Arc<dyn SyncSetListener>) {
        self.listeners.write().push(listener);
    }

    /// Open a batch, waiting for any other open batch to end first.
    pub fn begin_batch(&self) -> Batch<'_> {
        Batch {
            tree: self,
            ops: Vec::new(),
            _section: self.batch_lock.lock(),
        }
    }

    /// The current state of `resource`; `None` means in sync or not tracked.
    pub fn get(&self, resource: &ResourcePath) -> Option<SyncState> {
        self.state
            .read()
            .nodes
            .get(resource)
            .and_then(|node| node.state.clone())
    }

    /// Number of out-of-sync resources strictly below `resource`.
    pub fn out_of_sync_descendants(&self, resource: &ResourcePath) -> usize {
        self.state
            .read()
            .nodes
            .get(resource)
            .map_or(0, |node| node.descendants)
    }

    pub fn has_out_of_sync_descendants(&self, resource: &ResourcePath) -> bool {
        self.out_of_sync_descendants(resource) > 0
    }

    /// Top-level resources that are out of sync or contain out-of-sync
    /// resources.
    pub fn roots(&self) -> Vec<ResourcePath> {
        self.children(&ResourcePath::root())
    }

    /// Direct children of `resource` present in the tree.
    pub fn children(&self, resource: &ResourcePath) -> Vec<ResourcePath> {
        self.state
            .read()
            .nodes
            .get(resource)
            .map(|node| node.children.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Out-of-sync states at or below `resource` within `depth`, in path order.
    pub fn out_of_sync_in(&self, resource: &ResourcePath, depth: Depth) -> Vec<SyncState> {
        let state = self.state.read();
        let mut result = Vec::new();
        state.collect(resource, Some(depth), &mut |node: &Node| {
            if let Some(s) = &node.state {
                result.push(s.clone());
            }
        });
        result
    }

    /// Every out-of-sync resource at or below `resource`.
    pub fn resources_under(&self, resource: &ResourcePath) -> Vec<ResourcePath> {
        self.out_of_sync_in(resource, Depth::Infinite)
            .into_iter()
            .map(|s| s.resource().clone())
            .collect()
    }

    /// Number of out-of-sync resources.
    pub fn len(&self) -> usize {
        let state = self.state.read();
        match state.nodes.get(&ResourcePath::root()) {
            Some(root) => root.descendants + usize::from(root.state.is_some()),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn commit(&self, ops: Vec<Op>) {
        if ops.is_empty() {
            return;
        }

        let delta = {
            let mut state = self.state.write();
            let mut before: BTreeMap<ResourcePath, Option<SyncState>> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Upsert(new_state) => {
                        let resource = new_state.resource().clone();
                        state.remember(&mut before, &resource);
                        if new_state.is_out_of_sync() {
                            state.insert(new_state);
                        } else {
                            state.remove(&resource);
                        }
                    }
                    Op::Remove(resource) => {
                        state.remember(&mut before, &resource);
                        state.remove(&resource);
                    }
                    Op::RemoveSubtree(resource) => {
                        let mut tracked = Vec::new();
                        state.collect(&resource, None, &mut |node: &Node| {
                            if let Some(s) = &node.state {
                                tracked.push(s.resource().clone());
                            }
                        });
                        for path in tracked {
                            state.remember(&mut before, &path);
                            state.remove(&path);
                        }
                    }
                }
            }

            state.delta(before)
        };

        if delta.is_empty() {
            return;
        }

        tracing::debug!(
            added = delta.added.len(),
            changed = delta.changed.len(),
            removed = delta.removed.len(),
            "Committed sync set batch"
        );

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.sync_set_changed(&delta);
        }
    }
}

impl std::fmt::Debug for SyncTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTree")
            .field("len", &self.len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl TreeState {
    fn remember(
        &self,
        before: &mut BTreeMap<ResourcePath, Option<SyncState>>,
        resource: &ResourcePath,
    ) {
        if !before.contains_key(resource) {
            let current = self.nodes.get(resource).and_then(|n| n.state.clone());
            before.insert(resource.clone(), current);
        }
    }

    fn insert(&mut self, new_state: SyncState) {
        let resource = new_state.resource().clone();
        let node = self.nodes.entry(resource.clone()).or_default();
        let newly_tracked = node.state.is_none();
        node.state = Some(new_state);

        if !newly_tracked {
            return;
        }

        let mut child = resource;
        while let Some(parent) = child.parent() {
            let node = self.nodes.entry(parent.clone()).or_default();
            node.descendants += 1;
            node.children.insert(child);
            child = parent;
        }
    }

    fn remove(&mut self, resource: &ResourcePath) {
        let was_tracked = match self.nodes.get_mut(resource) {
            Some(node) => node.state.take().is_some(),
            None => return,
        };

        if was_tracked {
            for ancestor in resource.ancestors() {
                if let Some(node) = self.nodes.get_mut(&ancestor) {
                    node.descendants -= 1;
                }
            }
        }

        self.prune(resource.clone());
    }

    /// Drop empty nodes from `resource` upwards.
    fn prune(&mut self, resource: ResourcePath) {
        let mut current = Some(resource);
        while let Some(path) = current {
            let empty = self
                .nodes
                .get(&path)
                .is_some_and(|n| n.state.is_none() && n.descendants == 0);
            if !empty {
                break;
            }
            self.nodes.remove(&path);
            current = path.parent();
            if let Some(parent) = &current
                && let Some(node) = self.nodes.get_mut(parent)
            {
                node.children.remove(&path);
            }
        }
    }

    /// Visit `resource` and its descendants within `depth` (`None` means
    /// unbounded) in path order.
    fn collect(&self, resource: &ResourcePath, depth: Option<Depth>, visit: &mut dyn FnMut(&Node)) {
        let Some(node) = self.nodes.get(resource) else {
            return;
        };
        visit(node);

        let child_depth = match depth {
            None => None,
            Some(d) => match d.child_depth() {
                Some(cd) => Some(cd),
                None => return,
            },
        };
        for child in &node.children {
            self.collect(child, child_depth, visit);
        }
    }

    fn delta(&self, before: BTreeMap<ResourcePath, Option<SyncState>>) -> SyncSetDelta {
        let mut delta = SyncSetDelta::default();
        for (resource, old) in before {
            let new = self.nodes.get(&resource).and_then(|n| n.state.clone());
            match (old, new) {
                (None, Some(new)) => delta.added.push(new),
                (Some(old), Some(new)) if old != new => delta.changed.push(new),
                (Some(_), None) => delta.removed.push(resource),
                _ => {}
            }
        }
        delta
    }
}

impl Batch<'_> {
    /// Record the new state of a resource. An in-sync state removes it.
    pub fn upsert(&mut self, state: SyncState) {
        self.ops.push(Op::Upsert(state));
    }

    /// Stop tracking a single resource.
    pub fn remove(&mut self, resource: ResourcePath) {
        self.ops.push(Op::Remove(resource));
    }

    /// Stop tracking a resource and everything below it.
    pub fn remove_subtree(&mut self, resource: ResourcePath) {
        self.ops.push(Op::RemoveSubtree(resource));
    }

    /// Number of staged mutations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Commit the batch and notify listeners.
    pub fn end(self) {
        // Commit happens in Drop
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.tree.commit(ops);
    }
}
