//! Change signals consumed by the event collector

use serde::{Deserialize, Serialize};

use crate::{ResourcePath, SyncState};

/// How far below a resource a signal reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Depth {
    /// The resource only
    Zero,
    /// The resource and its direct children
    One,
    /// The resource and all its descendants
    Infinite,
}

impl Depth {
    /// The depth to apply to each child when descending one level.
    ///
    /// Returns `None` when the children are out of reach.
    pub fn child_depth(self) -> Option<Depth> {
        match self {
            Depth::Zero => None,
            Depth::One => Some(Depth::Zero),
            Depth::Infinite => Some(Depth::Infinite),
        }
    }
}

/// A raw per-resource signal raised by the protocol parser, a file-system
/// watcher or a bulk refresh.
///
/// Each event is consumed exactly once by the event collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChangeEvent {
    /// The resource (and, at infinite depth, its subtree) is no longer tracked
    Removed { resource: ResourcePath, depth: Depth },
    /// The resource changed; `state` carries a precomputed result when the
    /// producer already knows it
    Changed {
        resource: ResourcePath,
        depth: Depth,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<SyncState>,
    },
    /// Recompute everything under the resource from scratch
    Initialize { resource: ResourcePath, depth: Depth },
}

impl ChangeEvent {
    pub fn removed(resource: ResourcePath, depth: Depth) -> Self {
        ChangeEvent::Removed { resource, depth }
    }

    pub fn changed(resource: ResourcePath, depth: Depth) -> Self {
        ChangeEvent::Changed {
            resource,
            depth,
            state: None,
        }
    }

    /// A change whose resulting state is already known.
    pub fn computed(state: SyncState) -> Self {
        ChangeEvent::Changed {
            resource: state.resource().clone(),
            depth: Depth::Zero,
            state: Some(state),
        }
    }

    pub fn initialize(resource: ResourcePath, depth: Depth) -> Self {
        ChangeEvent::Initialize { resource, depth }
    }

    pub fn resource(&self) -> &ResourcePath {
        match self {
            ChangeEvent::Removed { resource, .. }
            | ChangeEvent::Changed { resource, .. }
            | ChangeEvent::Initialize { resource, .. } => resource,
        }
    }

    pub fn depth(&self) -> Depth {
        match self {
            ChangeEvent::Removed { depth, .. }
            | ChangeEvent::Changed { depth, .. }
            | ChangeEvent::Initialize { depth, .. } => *depth,
        }
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeEvent::Removed { resource, depth } => {
                write!(f, "removed {} ({:?})", resource, depth)
            }
            ChangeEvent::Changed {
                resource,
                depth,
                state: Some(state),
            } => write!(f, "changed {} ({:?}) -> {}", resource, depth, state.kind()),
            ChangeEvent::Changed { resource, depth, .. } => {
                write!(f, "changed {} ({:?})", resource, depth)
            }
            ChangeEvent::Initialize { resource, depth } => {
                write!(f, "initialize {} ({:?})", resource, depth)
            }
        }
    }
}
