//! Event sequences through the collector against a sequential model
//!
//! The worker batches and flushes on its own schedule; whatever the batch
//! boundaries, the committed tree must match applying the events one by one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use sync_core::{CollectorConfig, EventCollector, Revisions, Subscriber, within_depth};
use sync_model::{ChangeEvent, Depth, ResourcePath, SyncState};
use sync_test_utils::{ScriptedSubscriber, conflicting, in_sync, incoming, outgoing, path};
use sync_tree::SyncTree;

const WAIT: Duration = Duration::from_secs(10);
const ROOTS: [&str; 3] = ["r0", "r1", "r2"];
const FILES: [&str; 4] = ["f0", "f1", "d/g0", "d/g1"];
/// Directory whose state and members cannot be read when failures are on
const UNREADABLE: &str = "r1/d";

fn files() -> Vec<ResourcePath> {
    ROOTS
        .iter()
        .flat_map(|root| FILES.iter().map(move |file| path(&format!("{root}/{file}"))))
        .collect()
}

/// Every resource an event may name: roots, directories and files.
fn universe() -> Vec<ResourcePath> {
    let mut all: Vec<ResourcePath> = ROOTS.iter().map(|root| path(root)).collect();
    all.extend(ROOTS.iter().map(|root| path(&format!("{root}/d"))));
    all.extend(files());
    all
}

fn revisions(choice: usize) -> Revisions {
    match choice {
        0 => Revisions::default(),
        1 => in_sync(),
        2 => incoming(),
        3 => outgoing(),
        _ => conflicting(),
    }
}

fn event_strategy() -> impl Strategy<Value = ChangeEvent> {
    let target = prop::sample::select(universe());
    let depth = prop::sample::select(vec![Depth::Zero, Depth::One, Depth::Infinite]);
    prop_oneof![
        4 => (target.clone(), depth.clone()).prop_map(|(r, d)| ChangeEvent::changed(r, d)),
        2 => (target.clone(), depth).prop_map(|(r, d)| ChangeEvent::removed(r, d)),
        1 => target.prop_map(|r| ChangeEvent::initialize(r, Depth::Infinite)),
    ]
}

fn phase_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<ChangeEvent>)> {
    (
        prop::collection::vec(0..5usize, FILES.len() * ROOTS.len()),
        prop::collection::vec(event_strategy(), 0..24),
    )
}

/// Sequential rendition of the collector: one event at a time, no batching.
struct Model<'a> {
    subscriber: &'a ScriptedSubscriber,
    unreadable: Option<ResourcePath>,
    tracked: BTreeMap<ResourcePath, SyncState>,
}

impl Model<'_> {
    fn truth(&self, resource: &ResourcePath) -> Option<SyncState> {
        self.subscriber.memory().sync_state(resource).unwrap()
    }

    /// Resources a walk from `from` cannot reach because a directory on
    /// the way is unreadable. A walk only meets that directory when it is
    /// the starting point or still exists.
    fn blocked(&self, from: &ResourcePath, resource: &ResourcePath) -> bool {
        self.unreadable.as_ref().is_some_and(|bad| {
            bad.is_within(from)
                && resource.is_within(bad)
                && (bad == from || self.truth(bad).is_some())
        })
    }

    fn set(&mut self, resource: &ResourcePath, state: Option<SyncState>) {
        match state {
            Some(state) if state.is_out_of_sync() => {
                self.tracked.insert(resource.clone(), state);
            }
            _ => {
                self.tracked.remove(resource);
            }
        }
    }

    fn apply(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::Removed {
                resource,
                depth: Depth::Infinite,
            } => self.tracked.retain(|r, _| !r.is_within(resource)),
            ChangeEvent::Removed { resource, .. } => {
                self.tracked.remove(resource);
            }
            ChangeEvent::Changed { resource, depth, .. } => {
                self.recompute(resource, *depth, false)
            }
            ChangeEvent::Initialize { resource, depth } => self.recompute(resource, *depth, true),
        }
    }

    /// Changed refreshes what still exists; Initialize also drops what
    /// vanished. Unreachable entries keep their state either way.
    fn recompute(&mut self, from: &ResourcePath, depth: Depth, initialize: bool) {
        if self.blocked(from, from) {
            return;
        }
        if self.truth(from).is_none() {
            self.tracked.retain(|r, _| !r.is_within(from));
            return;
        }
        for resource in universe() {
            if !within_depth(from, &resource, depth) || self.blocked(from, &resource) {
                continue;
            }
            match self.truth(&resource) {
                Some(state) => self.set(&resource, Some(state)),
                None if initialize => self.set(&resource, None),
                None => {}
            }
        }
    }
}

fn assert_matches(collector: &EventCollector, model: &Model<'_>) {
    for resource in universe() {
        assert_eq!(
            collector.tree().get(&resource),
            model.tracked.get(&resource).cloned(),
            "state of {resource}"
        );
    }
    assert_eq!(collector.tree().len(), model.tracked.len());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_collector_matches_sequential_model(
        threshold in 1..6usize,
        unreadable in any::<bool>(),
        phases in prop::collection::vec(phase_strategy(), 1..4),
    ) {
        let subscriber = Arc::new(ScriptedSubscriber::with_roots(&ROOTS));
        if unreadable {
            subscriber.fail_on(UNREADABLE);
        }
        let collector = EventCollector::new(
            Arc::clone(&subscriber) as Arc<dyn Subscriber>,
            Arc::new(SyncTree::new()),
            &CollectorConfig { batch_threshold: threshold },
        );
        let mut model = Model {
            subscriber: &subscriber,
            unreadable: unreadable.then(|| path(UNREADABLE)),
            tracked: BTreeMap::new(),
        };

        for (choices, events) in phases {
            for (file, choice) in files().iter().zip(choices) {
                subscriber.memory().set(file.clone(), revisions(choice));
            }

            collector.enqueue_all(events.clone());
            prop_assert!(collector.wait_idle(WAIT));
            for event in &events {
                model.apply(event);
            }
            assert_matches(&collector, &model);
        }
    }
}
