//! Background refresh feeding the collector
//!
//! Remote revisions are staged on the subscriber, picked up by the refresh
//! scheduler and turned into sync tree updates by the collector.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{
    CollectorConfig, EventCollector, RefreshConfig, RefreshFamily, RefreshScheduler,
    RefreshStatus, SchedulerState, Subscriber,
};
use sync_model::{ChangeType, Depth, Direction};
use sync_test_utils::{DeltaRecorder, ScriptedSubscriber, in_sync, outgoing, path};
use sync_tree::SyncTree;

const WAIT: Duration = Duration::from_secs(10);

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

struct Harness {
    subscriber: Arc<ScriptedSubscriber>,
    collector: Arc<EventCollector>,
    recorder: Arc<DeltaRecorder>,
}

fn harness(roots: &[&str]) -> Harness {
    let subscriber = Arc::new(ScriptedSubscriber::with_roots(roots));
    let tree = Arc::new(SyncTree::new());
    let recorder = DeltaRecorder::attach(&tree);
    let collector = Arc::new(EventCollector::new(
        Arc::clone(&subscriber) as Arc<dyn Subscriber>,
        tree,
        &CollectorConfig::default(),
    ));
    Harness {
        subscriber,
        collector,
        recorder,
    }
}

fn scheduler(family: &RefreshFamily, h: &Harness, config: RefreshConfig) -> RefreshScheduler {
    let scheduler = RefreshScheduler::new(family.clone(), config);
    scheduler.set_target(
        Arc::clone(&h.subscriber) as Arc<dyn Subscriber>,
        Arc::clone(&h.collector),
        Depth::Infinite,
    );
    scheduler
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_commit_turns_outgoing_into_conflict() {
    let h = harness(&["m"]);
    h.subscriber.set("m/file.c", outgoing());
    h.collector.initialize();
    assert!(h.collector.wait_idle(WAIT));
    let tree = h.collector.tree();
    assert_eq!(
        tree.get(&path("m/file.c")).unwrap().direction(),
        Direction::Outgoing
    );

    h.subscriber
        .memory()
        .stage_remote(path("m/file.c"), Some("1.2".into()));
    let scheduler = scheduler(&RefreshFamily::new("cvs"), &h, RefreshConfig::default());
    assert_eq!(scheduler.run().await, RefreshStatus::Completed { changed: 1 });
    assert!(h.collector.wait_idle(WAIT));

    let state = tree.get(&path("m/file.c")).unwrap();
    assert_eq!(state.direction(), Direction::Conflicting);
    assert_eq!(state.change(), ChangeType::Change);
    let last = h.recorder.deltas().pop().unwrap();
    assert_eq!(last.changed.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_loop_picks_up_remote_changes() {
    let h = harness(&["m"]);
    h.subscriber.set("m/a.c", in_sync());
    let config = RefreshConfig {
        interval_secs: 3600,
        auto_reschedule: true,
        restart_on_cancel: false,
    };
    let scheduler = scheduler(&RefreshFamily::new("cvs"), &h, config);
    scheduler.start();

    h.subscriber
        .memory()
        .stage_remote(path("m/a.c"), Some("1.2".into()));
    scheduler.schedule_now();
    assert!(eventually(|| h.collector.tree().get(&path("m/a.c")).is_some()).await);
    assert_eq!(
        h.collector.tree().get(&path("m/a.c")).unwrap().direction(),
        Direction::Incoming
    );

    // Rescheduled for the next interval
    assert!(eventually(|| scheduler.state() == SchedulerState::Scheduled).await);

    h.subscriber
        .memory()
        .stage_remote(path("m/b.c"), Some("1.1".into()));
    scheduler.schedule_now();
    assert!(eventually(|| scheduler.runs() == 2).await);
    assert!(h.collector.wait_idle(WAIT));
    assert_eq!(h.collector.tree().len(), 2);

    scheduler.shutdown().await;
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_family_serializes_background_loops() {
    let family = RefreshFamily::new("cvs");
    let config = RefreshConfig {
        interval_secs: 0,
        auto_reschedule: true,
        restart_on_cancel: false,
    };
    let first = harness(&["a"]);
    let second = harness(&["b"]);
    first.subscriber.set_refresh_delay(Duration::from_millis(15));
    second.subscriber.set_refresh_delay(Duration::from_millis(15));

    let one = scheduler(&family, &first, config.clone());
    let two = scheduler(&family, &second, config);
    one.start();
    two.start();

    assert!(eventually(|| one.runs() >= 3 && two.runs() >= 3).await);
    one.shutdown().await;
    two.shutdown().await;

    for a in first.subscriber.spans() {
        for b in second.subscriber.spans() {
            assert!(!a.overlaps(&b), "refreshes of one family overlapped");
        }
    }
}
