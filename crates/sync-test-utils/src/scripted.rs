//! A subscriber that misbehaves on request
//!
//! Wraps a [`MemorySubscriber`] and adds failures for chosen resources, a gate
//! that holds refreshes until opened, an artificial refresh delay and a log of
//! when each refresh ran.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use sync_core::{BulkScan, Error, MemorySubscriber, Result, Revisions, Subscriber};
use sync_model::{ComparisonMode, Depth, ResourcePath, SyncState};

/// A latch that blocks callers until opened.
#[derive(Debug)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
    waiting: AtomicUsize,
}

impl Gate {
    fn new(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            opened: Condvar::new(),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    pub fn close(&self) {
        *self.open.lock() = false;
    }

    /// Callers currently blocked on the gate
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Spin until at least `count` callers are blocked, or `timeout` passes.
    pub fn wait_for_waiters(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.waiting() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }

    fn pass(&self) {
        let mut open = self.open.lock();
        if *open {
            return;
        }
        self.waiting.fetch_add(1, Ordering::SeqCst);
        while !*open {
            self.opened.wait(&mut open);
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// When one refresh call ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSpan {
    pub root: ResourcePath,
    pub started: Instant,
    pub finished: Instant,
}

impl RefreshSpan {
    pub fn overlaps(&self, other: &RefreshSpan) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

#[derive(Debug)]
pub struct ScriptedSubscriber {
    inner: MemorySubscriber,
    failing: Mutex<HashSet<ResourcePath>>,
    unlisted: Mutex<HashSet<ResourcePath>>,
    refresh_delay: Mutex<Duration>,
    state_delay: Mutex<Duration>,
    gate: Gate,
    spans: Mutex<Vec<RefreshSpan>>,
    state_calls: AtomicUsize,
}

impl ScriptedSubscriber {
    pub fn new(inner: MemorySubscriber) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            unlisted: Mutex::new(HashSet::new()),
            refresh_delay: Mutex::new(Duration::ZERO),
            state_delay: Mutex::new(Duration::ZERO),
            gate: Gate::new(true),
            spans: Mutex::new(Vec::new()),
            state_calls: AtomicUsize::new(0),
        }
    }

    /// A three-way subscriber over `roots`.
    pub fn with_roots(roots: &[&str]) -> Self {
        Self::new(
            MemorySubscriber::new(ComparisonMode::ThreeWay)
                .with_roots(roots.iter().map(ResourcePath::new).collect()),
        )
    }

    pub fn memory(&self) -> &MemorySubscriber {
        &self.inner
    }

    pub fn set(&self, resource: &str, revisions: Revisions) {
        self.inner.set(ResourcePath::new(resource), revisions);
    }

    /// Make every call about `resource` fail.
    pub fn fail_on(&self, resource: &str) {
        self.failing.lock().insert(ResourcePath::new(resource));
    }

    /// Make listing the members of `resource` fail while its own state
    /// still computes.
    pub fn fail_members_of(&self, resource: &str) {
        self.unlisted.lock().insert(ResourcePath::new(resource));
    }

    pub fn heal(&self, resource: &str) {
        let resource = ResourcePath::new(resource);
        self.failing.lock().remove(&resource);
        self.unlisted.lock().remove(&resource);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = delay;
    }

    /// Slow down every state computation.
    pub fn set_state_delay(&self, delay: Duration) {
        *self.state_delay.lock() = delay;
    }

    /// Hold refreshes at the gate until [`Gate::open`].
    pub fn close_gate(&self) {
        self.gate.close();
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn spans(&self) -> Vec<RefreshSpan> {
        self.spans.lock().clone()
    }

    pub fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    fn check(&self, resource: &ResourcePath) -> Result<()> {
        if self.failing.lock().contains(resource) {
            return Err(Error::subscriber(resource, "injected failure"));
        }
        Ok(())
    }
}

impl Subscriber for ScriptedSubscriber {
    fn roots(&self) -> Vec<ResourcePath> {
        self.inner.roots()
    }

    fn sync_state(&self, resource: &ResourcePath) -> Result<Option<SyncState>> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.check(resource)?;
        self.inner.sync_state(resource)
    }

    fn members(&self, resource: &ResourcePath) -> Result<Vec<ResourcePath>> {
        self.check(resource)?;
        if self.unlisted.lock().contains(resource) {
            return Err(Error::subscriber(resource, "injected listing failure"));
        }
        self.inner.members(resource)
    }

    fn all_out_of_sync(&self, roots: &[ResourcePath], depth: Depth) -> Result<BulkScan> {
        self.inner.all_out_of_sync(roots, depth)
    }

    fn refresh(&self, roots: &[ResourcePath], depth: Depth) -> Result<Vec<ResourcePath>> {
        let started = Instant::now();
        self.gate.pass();
        let delay = *self.refresh_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let result = roots
            .iter()
            .try_for_each(|root| self.check(root))
            .and_then(|()| self.inner.refresh(roots, depth));

        let root = roots.first().cloned().unwrap_or_else(ResourcePath::root);
        self.spans.lock().push(RefreshSpan {
            root,
            started,
            finished: Instant::now(),
        });
        result
    }
}
