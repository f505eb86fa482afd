//! A subscriber backed by an in-memory revision table
//!
//! Used by the command line to evaluate captured workspace snapshots, and by
//! tests as a deterministic backend. Remote updates are staged and only become
//! visible when [`Subscriber::refresh`] runs over their resource.
//!
//! Snapshot format:
//!
//! ```toml
//! mode = "three-way"     # or "two-way"
//! roots = ["src"]        # optional, defaults to the top-level entries
//! bulk = true            # answer all_out_of_sync without a traversal
//!
//! [[resource]]
//! path = "src/main.c"
//! local = "1.4*"
//! base = "1.4"
//! remote = "1.5"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sync_model::{ComparisonMode, Depth, ResourcePath, RevisionId, SyncKind, SyncState};

use crate::subscriber::{BulkScan, Subscriber, within_depth};
use crate::{Error, Result};

/// The three revisions known for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revisions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<RevisionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<RevisionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RevisionId>,
}

impl Revisions {
    fn is_empty(&self) -> bool {
        self.local.is_none() && self.base.is_none() && self.remote.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    mode: ComparisonMode,
    #[serde(default)]
    roots: Vec<ResourcePath>,
    #[serde(default)]
    bulk: bool,
    #[serde(default, rename = "resource")]
    resources: Vec<SnapshotEntry>,
}

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    path: ResourcePath,
    #[serde(default)]
    local: Option<RevisionId>,
    #[serde(default)]
    base: Option<RevisionId>,
    #[serde(default)]
    remote: Option<RevisionId>,
}

#[derive(Debug, Default)]
pub struct MemorySubscriber {
    mode: ComparisonMode,
    roots: Vec<ResourcePath>,
    bulk: bool,
    entries: RwLock<BTreeMap<ResourcePath, Revisions>>,
    staged: Mutex<Vec<(ResourcePath, Option<RevisionId>)>>,
}

impl MemorySubscriber {
    pub fn new(mode: ComparisonMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Manage exactly `roots` instead of the top-level entries.
    pub fn with_roots(mut self, roots: Vec<ResourcePath>) -> Self {
        self.roots = roots;
        self
    }

    /// Answer [`Subscriber::all_out_of_sync`] from the table.
    pub fn with_bulk_scan(mut self, bulk: bool) -> Self {
        self.bulk = bulk;
        self
    }

    /// Parse a snapshot from TOML content.
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML or when a path appears twice.
    pub fn from_snapshot_str(content: &str) -> Result<Self> {
        let snapshot: Snapshot = toml::from_str(content)?;
        let subscriber = Self::new(snapshot.mode)
            .with_roots(snapshot.roots)
            .with_bulk_scan(snapshot.bulk);

        {
            let mut entries = subscriber.entries.write();
            for entry in snapshot.resources {
                let revisions = Revisions {
                    local: entry.local,
                    base: entry.base,
                    remote: entry.remote,
                };
                if entries.insert(entry.path.clone(), revisions).is_some() {
                    return Err(Error::InvalidSnapshot {
                        message: format!("duplicate resource {}", entry.path),
                    });
                }
            }
        }

        Ok(subscriber)
    }

    /// Load a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let subscriber = Self::from_snapshot_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            resources = subscriber.entries.read().len(),
            "Loaded snapshot"
        );
        Ok(subscriber)
    }

    pub fn mode(&self) -> ComparisonMode {
        self.mode
    }

    /// Replace the revisions of `resource`.
    pub fn set(&self, resource: ResourcePath, revisions: Revisions) {
        let mut entries = self.entries.write();
        if revisions.is_empty() {
            entries.remove(&resource);
        } else {
            entries.insert(resource, revisions);
        }
    }

    /// Record a local edit (or deletion, with `None`).
    pub fn set_local(&self, resource: ResourcePath, revision: Option<RevisionId>) {
        let mut revisions = self.revisions(&resource).unwrap_or_default();
        revisions.local = revision;
        self.set(resource, revisions);
    }

    pub fn revisions(&self, resource: &ResourcePath) -> Option<Revisions> {
        self.entries.read().get(resource).cloned()
    }

    /// Stage a remote revision to be picked up by the next refresh.
    pub fn stage_remote(&self, resource: ResourcePath, revision: Option<RevisionId>) {
        self.staged.lock().push((resource, revision));
    }

    /// Number of staged remote updates not yet refreshed.
    pub fn pending_remote(&self) -> usize {
        self.staged.lock().len()
    }

    fn state_of(&self, resource: &ResourcePath, revisions: &Revisions) -> SyncState {
        SyncState::compute(
            resource.clone(),
            self.mode,
            revisions.local.clone(),
            revisions.base.clone(),
            revisions.remote.clone(),
        )
    }
}

impl Subscriber for MemorySubscriber {
    fn roots(&self) -> Vec<ResourcePath> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }
        let top_level: BTreeSet<ResourcePath> = self
            .entries
            .read()
            .keys()
            .filter_map(|path| path.segments().next().map(ResourcePath::new))
            .collect();
        top_level.into_iter().collect()
    }

    fn sync_state(&self, resource: &ResourcePath) -> Result<Option<SyncState>> {
        let entries = self.entries.read();
        if let Some(revisions) = entries.get(resource) {
            return Ok(Some(self.state_of(resource, revisions)));
        }
        // A folder exists as long as something below it does
        if entries.keys().any(|path| path.is_descendant_of(resource)) {
            return Ok(Some(SyncState::new(
                resource.clone(),
                SyncKind::IN_SYNC,
                self.mode,
            )));
        }
        Ok(None)
    }

    fn members(&self, resource: &ResourcePath) -> Result<Vec<ResourcePath>> {
        let level = resource.depth();
        let children: BTreeSet<ResourcePath> = self
            .entries
            .read()
            .keys()
            .filter(|path| path.is_descendant_of(resource))
            .filter_map(|path| path.segments().nth(level).map(|name| resource.join(name)))
            .collect();
        Ok(children.into_iter().collect())
    }

    fn all_out_of_sync(&self, roots: &[ResourcePath], depth: Depth) -> Result<BulkScan> {
        if !self.bulk {
            return Ok(BulkScan::Unsupported);
        }
        let states = self
            .entries
            .read()
            .iter()
            .filter(|(path, _)| roots.iter().any(|root| within_depth(root, path, depth)))
            .map(|(path, revisions)| self.state_of(path, revisions))
            .filter(SyncState::is_out_of_sync)
            .collect();
        Ok(BulkScan::Supported(states))
    }

    fn refresh(&self, roots: &[ResourcePath], depth: Depth) -> Result<Vec<ResourcePath>> {
        let ready: Vec<(ResourcePath, Option<RevisionId>)> = {
            let mut staged = self.staged.lock();
            let (ready, waiting): (Vec<_>, Vec<_>) = staged
                .drain(..)
                .partition(|(path, _)| roots.iter().any(|root| within_depth(root, path, depth)));
            *staged = waiting;
            ready
        };

        let mut changed = BTreeSet::new();
        for (resource, revision) in ready {
            let mut revisions = self.revisions(&resource).unwrap_or_default();
            if revisions.remote != revision {
                revisions.remote = revision;
                self.set(resource.clone(), revisions);
                changed.insert(resource);
            }
        }

        tracing::debug!(roots = roots.len(), changed = changed.len(), "Refreshed");
        Ok(changed.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sync_model::{ChangeType, Direction};

    const SNAPSHOT: &str = r#"
mode = "three-way"

[[resource]]
path = "src/main.c"
local = "1.2"
base = "1.2"
remote = "1.3"

[[resource]]
path = "src/lib/util.c"
local = "1.1*"
base = "1.1"
remote = "1.1"

[[resource]]
path = "README"
local = "1.1"
base = "1.1"
remote = "1.1"
"#;

    fn path(p: &str) -> ResourcePath {
        ResourcePath::new(p)
    }

    #[test]
    fn test_snapshot_states() {
        let subscriber = MemorySubscriber::from_snapshot_str(SNAPSHOT).unwrap();

        let main = subscriber.sync_state(&path("src/main.c")).unwrap().unwrap();
        assert_eq!(main.direction(), Direction::Incoming);
        assert_eq!(main.change(), ChangeType::Change);

        let util = subscriber.sync_state(&path("src/lib/util.c")).unwrap().unwrap();
        assert_eq!(util.direction(), Direction::Outgoing);

        let readme = subscriber.sync_state(&path("README")).unwrap().unwrap();
        assert!(!readme.is_out_of_sync());
    }

    #[test]
    fn test_folders_are_implicit() {
        let subscriber = MemorySubscriber::from_snapshot_str(SNAPSHOT).unwrap();

        let folder = subscriber.sync_state(&path("src/lib")).unwrap().unwrap();
        assert!(!folder.is_out_of_sync());
        assert_eq!(subscriber.sync_state(&path("nowhere")).unwrap(), None);
    }

    #[test]
    fn test_roots_and_members() {
        let subscriber = MemorySubscriber::from_snapshot_str(SNAPSHOT).unwrap();

        assert_eq!(subscriber.roots(), vec![path("README"), path("src")]);
        assert_eq!(
            subscriber.members(&path("src")).unwrap(),
            vec![path("src/lib"), path("src/main.c")]
        );
        assert_eq!(
            subscriber.members(&ResourcePath::root()).unwrap(),
            vec![path("README"), path("src")]
        );
        assert!(subscriber.members(&path("README")).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let content = "[[resource]]\npath = \"a\"\n[[resource]]\npath = \"./a\"\n";
        let result = MemorySubscriber::from_snapshot_str(content);
        assert!(matches!(result, Err(Error::InvalidSnapshot { .. })));
    }

    #[test]
    fn test_bulk_scan_only_when_enabled() {
        let subscriber = MemorySubscriber::from_snapshot_str(SNAPSHOT).unwrap();
        assert_eq!(
            subscriber
                .all_out_of_sync(&[path("src")], Depth::Infinite)
                .unwrap(),
            BulkScan::Unsupported
        );

        let subscriber = subscriber.with_bulk_scan(true);
        match subscriber
            .all_out_of_sync(&[path("src")], Depth::Infinite)
            .unwrap()
        {
            BulkScan::Supported(states) => {
                let paths: Vec<&str> = states.iter().map(|s| s.resource().as_str()).collect();
                assert_eq!(paths, vec!["src/lib/util.c", "src/main.c"]);
            }
            BulkScan::Unsupported => panic!("bulk scan was enabled"),
        }
    }

    #[test]
    fn test_refresh_applies_only_staged_updates_in_scope() {
        let subscriber = MemorySubscriber::new(ComparisonMode::ThreeWay);
        subscriber.set(
            path("a/x"),
            Revisions {
                local: Some("1".into()),
                base: Some("1".into()),
                remote: Some("1".into()),
            },
        );
        subscriber.stage_remote(path("a/x"), Some("2".into()));
        subscriber.stage_remote(path("b/new"), Some("1".into()));

        let changed = subscriber.refresh(&[path("a")], Depth::Infinite).unwrap();
        assert_eq!(changed, vec![path("a/x")]);
        assert_eq!(subscriber.pending_remote(), 1);

        let state = subscriber.sync_state(&path("a/x")).unwrap().unwrap();
        assert_eq!(state.direction(), Direction::Incoming);

        let changed = subscriber.refresh(&[path("b")], Depth::Infinite).unwrap();
        assert_eq!(changed, vec![path("b/new")]);
        let state = subscriber.sync_state(&path("b/new")).unwrap().unwrap();
        assert_eq!(state.change(), ChangeType::Addition);
    }

    #[test]
    fn test_two_way_snapshot() {
        let content = r#"
mode = "two-way"

[[resource]]
path = "doc.txt"
local = "a"
remote = "b"
"#;
        let subscriber = MemorySubscriber::from_snapshot_str(content).unwrap();
        let state = subscriber.sync_state(&path("doc.txt")).unwrap().unwrap();
        assert_eq!(state.mode(), ComparisonMode::TwoWay);
        assert_eq!(state.direction(), Direction::Incoming);
    }
}
