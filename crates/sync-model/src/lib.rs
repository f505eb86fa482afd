//! Synchronization state model for Team Sync
//!
//! Leaf crate shared by every other layer. It provides:
//!
//! - [`ResourcePath`]: workspace-relative identity of a local resource
//! - [`SyncState`] and [`SyncKind`]: the computed comparison for one resource
//! - [`compare_three_way`] / [`compare_two_way`]: the comparison semantics
//! - [`ChangeEvent`] and [`Depth`]: the signals consumed by the event collector

pub mod error;
pub mod event;
pub mod path;
pub mod state;

pub use error::{Error, Result};
pub use event::{ChangeEvent, Depth};
pub use path::ResourcePath;
pub use state::{
    ChangeType, ComparisonMode, Direction, RevisionId, SyncKind, SyncState, compare_three_way,
    compare_two_way,
};
