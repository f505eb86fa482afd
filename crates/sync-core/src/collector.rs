//! Background computation of synchronization states
//!
//! The [`EventCollector`] owns a FIFO queue of [`ChangeEvent`]s and a single
//! worker thread that drains it. For each event the worker asks the
//! [`Subscriber`] for fresh states and stages the results; staged results are
//! committed to the [`SyncTree`] in one batch whenever enough of them pile up
//! or the queue runs dry.
//!
//! The worker is started lazily by the first enqueue and exits once the queue
//! is empty, so an idle collector holds no thread.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use sync_model::{ChangeEvent, Depth, ResourcePath, SyncState};
use sync_tree::SyncTree;

use crate::config::CollectorConfig;
use crate::error::ResourceError;
use crate::subscriber::{BulkScan, Subscriber};
use crate::{Error, Result};

const WORKER_NAME: &str = "sync-collector";

/// Counters describing what the collector has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    pub events_processed: usize,
    pub batches_flushed: usize,
    pub errors: usize,
}

/// A result waiting for the next flush
#[derive(Debug)]
enum Staged {
    Upsert(SyncState),
    Remove(ResourcePath),
    RemoveSubtree(ResourcePath),
}

#[derive(Debug, Default)]
struct Queue {
    events: VecDeque<ChangeEvent>,
    /// A worker owns the queue and will drain it
    running: bool,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    subscriber: Arc<dyn Subscriber>,
    tree: Arc<SyncTree>,
    batch_threshold: usize,
    queue: Mutex<Queue>,
    idle: Condvar,
    closed: AtomicBool,
    errors: Mutex<Vec<ResourceError>>,
    events_processed: AtomicUsize,
    batches_flushed: AtomicUsize,
}

/// Turns change events into committed sync tree updates.
///
/// Every event is handled exactly once, in enqueue order. A failure on one
/// resource is recorded and skipped; the rest of the event still completes.
pub struct EventCollector {
    shared: Arc<Shared>,
}

impl EventCollector {
    pub fn new(
        subscriber: Arc<dyn Subscriber>,
        tree: Arc<SyncTree>,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscriber,
                tree,
                batch_threshold: config.batch_threshold.max(1),
                queue: Mutex::new(Queue::default()),
                idle: Condvar::new(),
                closed: AtomicBool::new(false),
                errors: Mutex::new(Vec::new()),
                events_processed: AtomicUsize::new(0),
                batches_flushed: AtomicUsize::new(0),
            }),
        }
    }

    pub fn tree(&self) -> &Arc<SyncTree> {
        &self.shared.tree
    }

    pub fn subscriber(&self) -> &Arc<dyn Subscriber> {
        &self.shared.subscriber
    }

    /// Queue one event, starting the worker if none is running.
    ///
    /// Events enqueued after [`shutdown`](Self::shutdown) are dropped.
    pub fn enqueue(&self, event: ChangeEvent) {
        self.enqueue_all(std::iter::once(event));
    }

    /// Queue several events at once.
    ///
    /// The events become visible to the worker together, so they are
    /// batched as if they had arrived in one burst.
    pub fn enqueue_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        let mut queue = self.shared.queue.lock();
        if self.shared.is_closed() {
            tracing::debug!("Collector is shut down, dropping events");
            return;
        }

        let before = queue.events.len();
        queue.events.extend(events);
        if queue.events.len() == before || queue.running {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || shared.run());
        match spawned {
            Ok(handle) => {
                queue.running = true;
                // The previous worker has already released the queue for good
                queue.worker = Some(handle);
            }
            Err(e) => {
                // Events stay queued; the next enqueue retries the spawn
                tracing::error!(error = %Error::Spawn(e), "Could not start collector worker");
            }
        }
    }

    /// Recompute every root of the subscriber from scratch.
    pub fn initialize(&self) {
        let roots = self.shared.subscriber.roots();
        tracing::debug!(roots = roots.len(), "Initializing sync set");
        self.enqueue_all(
            roots
                .into_iter()
                .map(|root| ChangeEvent::initialize(root, Depth::Infinite)),
        );
    }

    /// Whether the worker is running or events are waiting.
    pub fn is_busy(&self) -> bool {
        let queue = self.shared.queue.lock();
        queue.running || !queue.events.is_empty()
    }

    /// Block until the queue is drained and the worker has exited.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while queue.running || !queue.events.is_empty() {
            if self.shared.idle.wait_until(&mut queue, deadline).timed_out() {
                return !(queue.running || !queue.events.is_empty());
            }
        }
        true
    }

    /// Stop processing.
    ///
    /// Pending events are discarded. The resource currently being computed
    /// completes, whatever was staged before it is flushed, and the worker
    /// exits. Blocks until it has.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let worker = {
            let mut queue = self.shared.queue.lock();
            let dropped = queue.events.len();
            queue.events.clear();
            if dropped > 0 {
                tracing::debug!(dropped, "Discarded pending events on shutdown");
            }
            queue.worker.take()
        };

        if let Some(handle) = worker {
            // A listener may call shutdown from the worker itself
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.shared.idle.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_closed()
    }

    /// Failures recorded so far.
    pub fn errors(&self) -> Vec<ResourceError> {
        self.shared.errors.lock().clone()
    }

    /// Drain the recorded failures.
    pub fn take_errors(&self) -> Vec<ResourceError> {
        std::mem::take(&mut *self.shared.errors.lock())
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            events_processed: self.shared.events_processed.load(Ordering::SeqCst),
            batches_flushed: self.shared.batches_flushed.load(Ordering::SeqCst),
            errors: self.shared.errors.lock().len(),
        }
    }
}

impl Drop for EventCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for EventCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCollector")
            .field("batch_threshold", &self.shared.batch_threshold)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Resources reached by one traversal.
#[derive(Default)]
struct Walk {
    visited: HashSet<ResourcePath>,
    /// Resources whose state or members could not be read
    failed: Vec<ResourcePath>,
}

impl Walk {
    /// A tracked entry is stale when the walk did not reach it and nothing
    /// above it failed.
    fn is_stale(&self, resource: &ResourcePath) -> bool {
        !self.visited.contains(resource)
            && !self.failed.iter().any(|failed| resource.is_within(failed))
    }
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Worker loop
    fn run(&self) {
        tracing::trace!("Collector worker started");
        let mut buffer = Vec::new();

        loop {
            let next = if self.is_closed() {
                None
            } else {
                self.queue.lock().events.pop_front()
            };

            match next {
                Some(event) => {
                    tracing::trace!(%event, "Processing");
                    self.process(event, &mut buffer);
                    self.events_processed.fetch_add(1, Ordering::SeqCst);
                }
                None => {
                    self.flush(&mut buffer);
                    let mut queue = self.queue.lock();
                    if queue.events.is_empty() || self.is_closed() {
                        queue.running = false;
                        self.idle.notify_all();
                        tracing::trace!("Collector worker idle");
                        return;
                    }
                }
            }
        }
    }

    fn process(&self, event: ChangeEvent, buffer: &mut Vec<Staged>) {
        match event {
            ChangeEvent::Removed { resource, depth } => {
                let staged = match depth {
                    Depth::Infinite => Staged::RemoveSubtree(resource),
                    Depth::Zero | Depth::One => Staged::Remove(resource),
                };
                self.stage(buffer, staged);
            }
            ChangeEvent::Changed {
                resource,
                depth,
                state: Some(state),
            } => {
                self.stage(buffer, Staged::Upsert(state));
                if let Some(child_depth) = depth.child_depth() {
                    self.collect_members(&resource, child_depth, buffer, &mut Walk::default());
                }
            }
            ChangeEvent::Changed {
                resource,
                depth,
                state: None,
            } => {
                self.collect(&resource, depth, buffer, &mut Walk::default());
            }
            ChangeEvent::Initialize { resource, depth } => {
                self.initialize(&resource, depth, buffer);
            }
        }
    }

    /// Compute `resource` and, within `depth`, everything below it.
    fn collect(
        &self,
        resource: &ResourcePath,
        depth: Depth,
        buffer: &mut Vec<Staged>,
        walk: &mut Walk,
    ) {
        if self.is_closed() {
            return;
        }
        walk.visited.insert(resource.clone());

        match self.subscriber.sync_state(resource) {
            Ok(Some(state)) => self.stage(buffer, Staged::Upsert(state)),
            Ok(None) => {
                // No longer under control; nothing below it is either
                self.stage(buffer, Staged::RemoveSubtree(resource.clone()));
                return;
            }
            Err(e) => {
                self.record(resource, &e);
                walk.failed.push(resource.clone());
                return;
            }
        }

        if let Some(child_depth) = depth.child_depth() {
            self.collect_members(resource, child_depth, buffer, walk);
        }
    }

    fn collect_members(
        &self,
        resource: &ResourcePath,
        child_depth: Depth,
        buffer: &mut Vec<Staged>,
        walk: &mut Walk,
    ) {
        match self.subscriber.members(resource) {
            Ok(children) => {
                for child in children {
                    self.collect(&child, child_depth, buffer, walk);
                }
            }
            Err(e) => {
                self.record(resource, &e);
                walk.failed.push(resource.clone());
            }
        }
    }

    /// Replace what the tree knows under `resource` with a fresh computation.
    ///
    /// Entries that are no longer out of sync are removed individually so
    /// the view never sees the subtree go empty in between. Entries under a
    /// resource that could not be computed keep their previous state.
    fn initialize(&self, resource: &ResourcePath, depth: Depth, buffer: &mut Vec<Staged>) {
        // The tracked set has to include everything staged so far
        self.flush(buffer);
        let tracked: Vec<ResourcePath> = self
            .tree
            .out_of_sync_in(resource, depth)
            .into_iter()
            .map(|state| state.resource().clone())
            .collect();

        let walk = match self.subscriber.all_out_of_sync(std::slice::from_ref(resource), depth) {
            Ok(BulkScan::Supported(states)) => {
                let mut walk = Walk::default();
                for state in states {
                    if state.is_out_of_sync() {
                        walk.visited.insert(state.resource().clone());
                    }
                    self.stage(buffer, Staged::Upsert(state));
                }
                walk
            }
            Ok(BulkScan::Unsupported) => {
                let mut walk = Walk::default();
                self.collect(resource, depth, buffer, &mut walk);
                walk
            }
            Err(e) => {
                self.record(resource, &e);
                return;
            }
        };

        if self.is_closed() {
            return;
        }
        for stale in tracked.into_iter().filter(|r| walk.is_stale(r)) {
            self.stage(buffer, Staged::Remove(stale));
        }
    }

    fn stage(&self, buffer: &mut Vec<Staged>, staged: Staged) {
        buffer.push(staged);
        if buffer.len() >= self.batch_threshold {
            self.flush(buffer);
        }
    }

    /// Commit everything staged as one batch.
    fn flush(&self, buffer: &mut Vec<Staged>) {
        if buffer.is_empty() {
            return;
        }

        let mut batch = self.tree.begin_batch();
        for staged in buffer.drain(..) {
            match staged {
                Staged::Upsert(state) => batch.upsert(state),
                Staged::Remove(resource) => batch.remove(resource),
                Staged::RemoveSubtree(resource) => batch.remove_subtree(resource),
            }
        }
        batch.end();
        self.batches_flushed.fetch_add(1, Ordering::SeqCst);
    }

    fn record(&self, resource: &ResourcePath, error: &Error) {
        tracing::warn!(%resource, %error, "Could not compute sync state");
        self.errors
            .lock()
            .push(ResourceError::new(resource.clone(), error));
    }
}

/// Feed a whole transcript's worth of events and wait for them to land.
///
/// Convenience for one-shot evaluation, such as the command line.
pub fn collect_blocking(
    collector: &EventCollector,
    events: impl IntoIterator<Item = ChangeEvent>,
    timeout: Duration,
) -> Result<CollectorStats> {
    collector.enqueue_all(events);
    if !collector.wait_idle(timeout) {
        return Err(Error::Timeout(timeout));
    }
    Ok(collector.stats())
}
