//! Event collection and background refresh for Team Sync
//!
//! This crate turns raw change signals into a maintained set of out-of-sync
//! resources:
//!
//! - [`Subscriber`]: the provider boundary that computes states
//! - [`EventCollector`]: queues [`ChangeEvent`](sync_model::ChangeEvent)s and
//!   commits results to a [`SyncTree`](sync_tree::SyncTree) in batches
//! - [`RefreshScheduler`]: refreshes remote knowledge now or periodically
//! - [`MemorySubscriber`]: a table-driven subscriber loaded from snapshots
//! - [`SyncConfig`]: engine settings loaded from TOML

pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod scheduler;
pub mod subscriber;

pub use collector::{CollectorStats, EventCollector, collect_blocking};
pub use config::{CollectorConfig, ProtocolConfig, RefreshConfig, SyncConfig};
pub use error::{Error, ResourceError, Result};
pub use memory::{MemorySubscriber, Revisions};
pub use scheduler::{
    MultiStatus, RefreshFamily, RefreshScheduler, RefreshStatus, SchedulerState,
};
pub use subscriber::{BulkScan, Subscriber, within_depth};
