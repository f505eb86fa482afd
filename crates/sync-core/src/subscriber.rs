//! The provider boundary between the engine and a version-control backend

use sync_model::{Depth, ResourcePath, SyncState};

use crate::Result;

/// Answer to a bulk out-of-sync query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkScan {
    /// Every out-of-sync state under the requested roots
    Supported(Vec<SyncState>),
    /// The provider cannot answer in bulk; fall back to a traversal
    Unsupported,
}

/// Computes synchronization states for a set of root resources.
///
/// Implementations are called from the collector's worker thread and from
/// the refresh scheduler's blocking pool, so they must be `Send + Sync`.
pub trait Subscriber: Send + Sync {
    /// The resources this subscriber manages
    fn roots(&self) -> Vec<ResourcePath>;

    /// The current state of `resource`.
    ///
    /// `Ok(None)` means the resource is not under synchronization control.
    fn sync_state(&self, resource: &ResourcePath) -> Result<Option<SyncState>>;

    /// Direct children of `resource` known locally or remotely
    fn members(&self, resource: &ResourcePath) -> Result<Vec<ResourcePath>>;

    /// All out-of-sync states under `roots` to `depth`, if the provider can
    /// answer without a traversal.
    fn all_out_of_sync(&self, roots: &[ResourcePath], depth: Depth) -> Result<BulkScan> {
        let _ = (roots, depth);
        Ok(BulkScan::Unsupported)
    }

    /// Bring remote knowledge for `roots` up to date.
    ///
    /// Returns the resources whose state may have changed.
    fn refresh(&self, roots: &[ResourcePath], depth: Depth) -> Result<Vec<ResourcePath>>;
}

/// Whether `resource` lies within `depth` of `root`.
pub fn within_depth(root: &ResourcePath, resource: &ResourcePath, depth: Depth) -> bool {
    match depth {
        Depth::Zero => resource == root,
        Depth::One => resource == root || resource.parent().as_ref() == Some(root),
        Depth::Infinite => resource.is_within(root),
    }
}
