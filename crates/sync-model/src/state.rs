//! Synchronization state and comparison semantics

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, ResourcePath, Result};

/// Which side a difference has to travel to bring the resource in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// No difference
    None,
    /// The remote side changed
    Incoming,
    /// The local side changed
    Outgoing,
    /// Both sides changed
    Conflicting,
}

/// What kind of difference exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    InSync,
    Addition,
    Deletion,
    Change,
}

/// How a [`SyncState`] was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    /// Local against remote
    TwoWay,
    /// Local against base against remote
    #[default]
    ThreeWay,
}

/// Opaque revision identifier (a revision number, tag or content id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

/// A validated (direction, change type) pair.
///
/// `direction == None` holds exactly when `change == InSync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSyncKind", into = "RawSyncKind")]
pub struct SyncKind {
    direction: Direction,
    change: ChangeType,
}

/// A computed comparison for one resource at one point in time.
///
/// Immutable once computed; recomputation produces a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    resource: ResourcePath,
    kind: SyncKind,
    mode: ComparisonMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local: Option<RevisionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base: Option<RevisionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote: Option<RevisionId>,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::None => "none",
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
            Direction::Conflicting => "conflicting",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeType::InSync => "in-sync",
            ChangeType::Addition => "addition",
            ChangeType::Deletion => "deletion",
            ChangeType::Change => "change",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonMode::TwoWay => f.write_str("two-way"),
            ComparisonMode::ThreeWay => f.write_str("three-way"),
        }
    }
}

impl FromStr for ComparisonMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "two-way" | "two_way" | "2" => Ok(ComparisonMode::TwoWay),
            "three-way" | "three_way" | "3" => Ok(ComparisonMode::ThreeWay),
            _ => Err(Error::UnknownMode {
                value: s.to_string(),
            }),
        }
    }
}

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl SyncKind {
    /// The only valid kind with direction `None`.
    pub const IN_SYNC: SyncKind = SyncKind {
        direction: Direction::None,
        change: ChangeType::InSync,
    };

    /// Validate and build a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSyncKind`] when exactly one of the two halves
    /// says "in sync".
    pub fn new(direction: Direction, change: ChangeType) -> Result<Self> {
        let no_direction = direction == Direction::None;
        let in_sync = change == ChangeType::InSync;
        if no_direction != in_sync {
            return Err(Error::InvalidSyncKind {
                direction: direction.to_string(),
                change: change.to_string(),
            });
        }
        Ok(Self { direction, change })
    }

    pub fn incoming(change: ChangeType) -> Result<Self> {
        Self::new(Direction::Incoming, change)
    }

    pub fn outgoing(change: ChangeType) -> Result<Self> {
        Self::new(Direction::Outgoing, change)
    }

    pub fn conflicting(change: ChangeType) -> Result<Self> {
        Self::new(Direction::Conflicting, change)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn change(&self) -> ChangeType {
        self.change
    }

    pub fn is_in_sync(&self) -> bool {
        self.change == ChangeType::InSync
    }

    // Only reachable with pairs already known to be valid.
    const fn of(direction: Direction, change: ChangeType) -> Self {
        Self { direction, change }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_in_sync() {
            f.write_str("in-sync")
        } else {
            write!(f, "{} {}", self.direction, self.change)
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawSyncKind {
    direction: Direction,
    change: ChangeType,
}

impl TryFrom<RawSyncKind> for SyncKind {
    type Error = Error;

    fn try_from(raw: RawSyncKind) -> Result<Self> {
        SyncKind::new(raw.direction, raw.change)
    }
}

impl From<SyncKind> for RawSyncKind {
    fn from(kind: SyncKind) -> Self {
        Self {
            direction: kind.direction,
            change: kind.change,
        }
    }
}

/// Classify a three-way comparison of local, base and remote revisions.
///
/// `None` means the resource does not exist on that side. Revisions compare
/// by identity, so a locally modified file must carry a local id distinct
/// from its base.
pub fn compare_three_way(
    local: Option<&RevisionId>,
    base: Option<&RevisionId>,
    remote: Option<&RevisionId>,
) -> SyncKind {
    match (local, base, remote) {
        (None, None, None) => SyncKind::IN_SYNC,
        (Some(_), None, None) => SyncKind::of(Direction::Outgoing, ChangeType::Addition),
        (None, None, Some(_)) => SyncKind::of(Direction::Incoming, ChangeType::Addition),
        (Some(_), None, Some(_)) => SyncKind::of(Direction::Conflicting, ChangeType::Addition),
        (None, Some(_), None) => SyncKind::of(Direction::Conflicting, ChangeType::Deletion),
        (None, Some(base), Some(remote)) => {
            if remote == base {
                SyncKind::of(Direction::Outgoing, ChangeType::Deletion)
            } else {
                SyncKind::of(Direction::Conflicting, ChangeType::Change)
            }
        }
        (Some(local), Some(base), None) => {
            if local == base {
                SyncKind::of(Direction::Incoming, ChangeType::Deletion)
            } else {
                SyncKind::of(Direction::Conflicting, ChangeType::Change)
            }
        }
        (Some(local), Some(base), Some(remote)) => {
            match (local == base, remote == base) {
                (true, true) => SyncKind::IN_SYNC,
                (true, false) => SyncKind::of(Direction::Incoming, ChangeType::Change),
                (false, true) => SyncKind::of(Direction::Outgoing, ChangeType::Change),
                (false, false) => SyncKind::of(Direction::Conflicting, ChangeType::Change),
            }
        }
    }
}

/// Classify a two-way comparison of local against remote.
///
/// Differences are reported as incoming: the remote side is the reference.
pub fn compare_two_way(local: Option<&RevisionId>, remote: Option<&RevisionId>) -> SyncKind {
    match (local, remote) {
        (None, None) => SyncKind::IN_SYNC,
        (None, Some(_)) => SyncKind::of(Direction::Incoming, ChangeType::Addition),
        (Some(_), None) => SyncKind::of(Direction::Incoming, ChangeType::Deletion),
        (Some(local), Some(remote)) if local == remote => SyncKind::IN_SYNC,
        (Some(_), Some(_)) => SyncKind::of(Direction::Incoming, ChangeType::Change),
    }
}

impl SyncState {
    /// Build a state from an already-classified kind.
    pub fn new(resource: ResourcePath, kind: SyncKind, mode: ComparisonMode) -> Self {
        Self {
            resource,
            kind,
            mode,
            local: None,
            base: None,
            remote: None,
        }
    }

    /// An in-sync state for `resource`.
    pub fn in_sync(resource: ResourcePath) -> Self {
        Self::new(resource, SyncKind::IN_SYNC, ComparisonMode::default())
    }

    /// Compute the state of `resource` from its revisions.
    ///
    /// In two-way mode the base revision is ignored for classification but
    /// still recorded.
    pub fn compute(
        resource: ResourcePath,
        mode: ComparisonMode,
        local: Option<RevisionId>,
        base: Option<RevisionId>,
        remote: Option<RevisionId>,
    ) -> Self {
        let kind = match mode {
            ComparisonMode::ThreeWay => {
                compare_three_way(local.as_ref(), base.as_ref(), remote.as_ref())
            }
            ComparisonMode::TwoWay => compare_two_way(local.as_ref(), remote.as_ref()),
        };
        Self {
            resource,
            kind,
            mode,
            local,
            base,
            remote,
        }
    }

    pub fn with_local(mut self, revision: RevisionId) -> Self {
        self.local = Some(revision);
        self
    }

    pub fn with_base(mut self, revision: RevisionId) -> Self {
        self.base = Some(revision);
        self
    }

    pub fn with_remote(mut self, revision: RevisionId) -> Self {
        self.remote = Some(revision);
        self
    }

    pub fn resource(&self) -> &ResourcePath {
        &self.resource
    }

    pub fn kind(&self) -> SyncKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction
    }

    pub fn change(&self) -> ChangeType {
        self.kind.change
    }

    pub fn mode(&self) -> ComparisonMode {
        self.mode
    }

    pub fn local(&self) -> Option<&RevisionId> {
        self.local.as_ref()
    }

    pub fn base(&self) -> Option<&RevisionId> {
        self.base.as_ref()
    }

    pub fn remote(&self) -> Option<&RevisionId> {
        self.remote.as_ref()
    }

    /// Whether the resource's direction is anything but `None`.
    pub fn is_out_of_sync(&self) -> bool {
        !self.kind.is_in_sync()
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.resource, self.kind)
    }
}
