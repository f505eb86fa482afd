//! End-to-end tests for the update pipeline
//!
//! Exercises the complete flow: snapshot -> initial collection -> server
//! transcript -> parser -> collector -> sync tree -> listener.

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{EventCollector, MemorySubscriber, Subscriber, SyncConfig};
use sync_model::{ChangeType, Direction, ResourcePath};
use sync_protocol::{FileState, Severity, StatusCode, Transcript, UpdateNotification, UpdateParser};
use sync_test_utils::{DeltaRecorder, path};
use sync_tree::SyncTree;

const WAIT: Duration = Duration::from_secs(10);

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../test-fixtures/workspaces/project")
        .join(name)
}

struct Workspace {
    config: SyncConfig,
    collector: EventCollector,
    recorder: Arc<DeltaRecorder>,
}

fn load_workspace() -> Workspace {
    let config = SyncConfig::load(&fixture("teamsync.toml")).unwrap();
    let subscriber = Arc::new(MemorySubscriber::load(&fixture("snapshot.toml")).unwrap());
    let tree = Arc::new(SyncTree::new());
    let recorder = DeltaRecorder::attach(&tree);
    let collector = EventCollector::new(
        subscriber as Arc<dyn Subscriber>,
        tree,
        &config.collector,
    );
    Workspace {
        config,
        collector,
        recorder,
    }
}

fn direction(tree: &SyncTree, p: &str) -> Option<Direction> {
    tree.get(&path(p)).map(|state| state.direction())
}

#[test]
fn test_initial_collection_matches_snapshot() {
    let ws = load_workspace();
    ws.collector.initialize();
    assert!(ws.collector.wait_idle(WAIT));

    let tree = ws.collector.tree();
    assert_eq!(tree.len(), 5);
    assert_eq!(tree.out_of_sync_descendants(&path("project")), 5);
    assert_eq!(tree.out_of_sync_descendants(&path("project/src")), 3);
    assert_eq!(direction(tree, "project/src/main.c"), Some(Direction::Incoming));
    assert_eq!(direction(tree, "project/src/parse.c"), Some(Direction::Conflicting));
    assert_eq!(direction(tree, "project/src/lex.c"), Some(Direction::Outgoing));
    assert_eq!(direction(tree, "project/Makefile"), None);

    let guide = tree.get(&path("project/doc/guide.txt")).unwrap();
    assert_eq!(guide.change(), ChangeType::Deletion);

    // In-sync results count toward the threshold of two but emit nothing
    let sizes = ws.recorder.batch_sizes();
    assert_eq!(sizes.iter().sum::<usize>(), 5);
    assert!(sizes.iter().all(|&size| (1..=2).contains(&size)));
    assert!(sizes.len() >= 3);
}

#[test]
fn test_transcript_parses_into_expected_notifications() {
    let transcript = Transcript::load(&fixture("update.log")).unwrap();
    let config = SyncConfig::load(&fixture("teamsync.toml")).unwrap();
    let mut parser = UpdateParser::with_prefixes(path("project"), config.protocol.prefixes());
    let replay = transcript.replay(&mut parser);

    let notifications: Vec<&UpdateNotification> = replay.notifications().collect();
    assert_eq!(
        notifications[0],
        &UpdateNotification::DirectoryExists {
            path: path("project")
        }
    );
    assert!(notifications.contains(&&UpdateNotification::FileInformation {
        state: FileState::MergeableConflict,
        path: path("project/src/parse.c"),
    }));
    assert!(notifications.contains(&&UpdateNotification::FileInformation {
        state: FileState::Modified,
        path: path("project/src/lex.c"),
    }));
    assert!(notifications.contains(&&UpdateNotification::DirectoryDoesNotExist {
        path: path("project/attic")
    }));
    assert!(notifications.contains(&&UpdateNotification::DirectoryIsNew {
        path: path("project/gen")
    }));

    let statuses: Vec<_> = replay.statuses().collect();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].code, StatusCode::Conflict);
    assert_eq!(replay.worst_severity(), Some(Severity::Warning));
    assert_eq!(replay.completed, Some(true));
}

#[test]
fn test_transcript_replay_updates_tree() {
    let ws = load_workspace();
    ws.collector.initialize();
    assert!(ws.collector.wait_idle(WAIT));
    let before = ws.recorder.count();

    let transcript = Transcript::load(&fixture("update.log")).unwrap();
    let mut parser = UpdateParser::with_prefixes(path("project"), ws.config.protocol.prefixes());
    let replay = transcript.replay(&mut parser);
    ws.collector.enqueue_all(replay.change_events());
    assert!(ws.collector.wait_idle(WAIT));

    let tree = ws.collector.tree();
    // The skipped directory drops out; everything else is unchanged
    assert_eq!(tree.len(), 4);
    assert!(tree.get(&path("project/attic/old.c")).is_none());
    assert_eq!(tree.out_of_sync_descendants(&path("project/attic")), 0);
    assert_eq!(direction(tree, "project/src/parse.c"), Some(Direction::Conflicting));
    assert!(tree.get(&path("project/doc/guide.txt")).is_some());
    assert!(ws.collector.errors().is_empty());

    let removed: Vec<ResourcePath> = ws.recorder.deltas()[before..]
        .iter()
        .flat_map(|delta| delta.removed.clone())
        .collect();
    assert_eq!(removed, vec![path("project/attic/old.c")]);
}

#[test]
fn test_reinitialize_after_local_commit() {
    let config = SyncConfig::default();
    let subscriber = Arc::new(MemorySubscriber::load(&fixture("snapshot.toml")).unwrap());
    let tree = Arc::new(SyncTree::new());
    let collector = EventCollector::new(
        Arc::clone(&subscriber) as Arc<dyn Subscriber>,
        Arc::clone(&tree),
        &config.collector,
    );
    collector.initialize();
    assert!(collector.wait_idle(WAIT));

    // lex.c committed: local, base and remote all move to 1.3
    let committed = sync_core::Revisions {
        local: Some("1.3".into()),
        base: Some("1.3".into()),
        remote: Some("1.3".into()),
    };
    subscriber.set(path("project/src/lex.c"), committed);
    let recorder = DeltaRecorder::attach(&tree);

    collector.initialize();
    assert!(collector.wait_idle(WAIT));

    assert_eq!(tree.len(), 4);
    let removed: Vec<ResourcePath> = recorder
        .deltas()
        .iter()
        .flat_map(|delta| delta.removed.clone())
        .collect();
    assert_eq!(removed, vec![path("project/src/lex.c")]);
}
