//! Transactional synchronization state container for Team Sync
//!
//! [`SyncTree`] stores the current [`SyncState`](sync_model::SyncState) of
//! every out-of-sync resource in a tree keyed by
//! [`ResourcePath`](sync_model::ResourcePath). Mutations are grouped in a
//! [`Batch`]; listeners observe one [`SyncSetDelta`] per committed batch.

mod delta;
mod tree;

pub use delta::{SyncSetDelta, SyncSetListener};
pub use tree::{Batch, SyncTree};
