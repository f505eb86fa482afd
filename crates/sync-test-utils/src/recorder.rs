//! Capture of committed deltas

use std::sync::Arc;

use parking_lot::Mutex;
use sync_tree::{SyncSetDelta, SyncSetListener, SyncTree};

/// Records every delta delivered to it.
#[derive(Debug, Default)]
pub struct DeltaRecorder {
    deltas: Mutex<Vec<SyncSetDelta>>,
}

impl DeltaRecorder {
    /// Create a recorder and register it on `tree`.
    pub fn attach(tree: &SyncTree) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        tree.add_listener(Arc::clone(&recorder) as Arc<dyn SyncSetListener>);
        recorder
    }

    pub fn deltas(&self) -> Vec<SyncSetDelta> {
        self.deltas.lock().clone()
    }

    /// Number of notifications received
    pub fn count(&self) -> usize {
        self.deltas.lock().len()
    }

    /// Resources touched by each notification, in order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.deltas.lock().iter().map(SyncSetDelta::len).collect()
    }
}

impl SyncSetListener for DeltaRecorder {
    fn sync_set_changed(&self, delta: &SyncSetDelta) {
        self.deltas.lock().push(delta.clone());
    }
}
