//! Shared test utilities for the Team Sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`fixtures`]: revision triples for each kind of difference
//! - [`recorder`]: a listener that captures every delta a tree emits
//! - [`scripted`]: a subscriber with injectable failures, gates and timing

pub mod fixtures;
pub mod recorder;
pub mod scripted;

pub use fixtures::{conflicting, in_sync, incoming, outgoing, path};
pub use recorder::DeltaRecorder;
pub use scripted::{Gate, RefreshSpan, ScriptedSubscriber};
