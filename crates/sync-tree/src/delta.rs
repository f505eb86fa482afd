//! Change notifications fired once per committed batch

use serde::Serialize;
use sync_model::{ResourcePath, SyncState};

/// The net effect of one batch, coalesced per resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSetDelta {
    /// Resources that became out of sync
    pub added: Vec<SyncState>,
    /// Resources that stayed out of sync with a new state
    pub changed: Vec<SyncState>,
    /// Resources that are no longer out of sync
    pub removed: Vec<ResourcePath>,
}

impl SyncSetDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Number of resources touched by the batch.
    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }

    /// Every resource the batch touched.
    pub fn resources(&self) -> impl Iterator<Item = &ResourcePath> {
        self.added
            .iter()
            .chain(self.changed.iter())
            .map(SyncState::resource)
            .chain(self.removed.iter())
    }
}

/// Observer of committed batches (the view layer).
///
/// Called after the tree's state lock is released but while the batch
/// section is still held, so deltas arrive in commit order. A listener must
/// not start a batch on the same tree.
pub trait SyncSetListener: Send + Sync {
    fn sync_set_changed(&self, delta: &SyncSetDelta);
}

impl<F> SyncSetListener for F
where
    F: Fn(&SyncSetDelta) + Send + Sync,
{
    fn sync_set_changed(&self, delta: &SyncSetDelta) {
        self(delta)
    }
}
