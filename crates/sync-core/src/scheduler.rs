//! Periodic background refresh of remote knowledge
//!
//! A [`RefreshScheduler`] asks its subscriber to refresh every root, feeds the
//! changed resources to the [`EventCollector`] and, when configured to, sleeps
//! for the interval and does it again. Schedulers that share a
//! [`RefreshFamily`] never run at the same time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use sync_model::{ChangeEvent, Depth};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::collector::EventCollector;
use crate::config::RefreshConfig;
use crate::error::ResourceError;
use crate::subscriber::Subscriber;

/// Mutual exclusion shared by every scheduler of one kind.
///
/// Cloning yields the same family.
#[derive(Debug, Clone)]
pub struct RefreshFamily {
    name: Arc<str>,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl RefreshFamily {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a member of this family is running right now.
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Nothing is scheduled
    Idle,
    /// Waiting for the interval to elapse
    Scheduled,
    /// A refresh is in progress
    Running,
}

/// Per-root failures of one refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MultiStatus {
    /// Resources reported changed by the roots that succeeded
    pub changed: usize,
    pub failures: Vec<ResourceError>,
}

/// Terminal status of one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RefreshStatus {
    Completed { changed: usize },
    Failed(MultiStatus),
    Cancelled { changed: usize },
}

impl RefreshStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, RefreshStatus::Completed { .. })
    }

    pub fn changed(&self) -> usize {
        match self {
            RefreshStatus::Completed { changed } | RefreshStatus::Cancelled { changed } => {
                *changed
            }
            RefreshStatus::Failed(status) => status.changed,
        }
    }
}

/// What a scheduler refreshes: a subscriber, the collector fed with its
/// results, and how deep to go below each root.
struct RefreshTarget {
    subscriber: Arc<dyn Subscriber>,
    collector: Arc<EventCollector>,
    depth: Depth,
}

struct Inner {
    family: RefreshFamily,
    config: Mutex<RefreshConfig>,
    target: Mutex<Option<Arc<RefreshTarget>>>,
    state: Mutex<SchedulerState>,
    /// Bumped by every cancellation; a run or wait is cancelled once the
    /// count moves past the value it started from
    cancels: Arc<AtomicU64>,
    /// A run was requested while one could not start
    dirty: AtomicBool,
    stopping: AtomicBool,
    looping: AtomicBool,
    wake: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
    runs: AtomicUsize,
}

/// Runs refreshes now, or repeatedly in the background.
///
/// Cloning yields a handle to the same scheduler.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(family: RefreshFamily, config: RefreshConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                family,
                config: Mutex::new(config),
                target: Mutex::new(None),
                state: Mutex::new(SchedulerState::Idle),
                cancels: Arc::new(AtomicU64::new(0)),
                dirty: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                looping: AtomicBool::new(false),
                wake: Notify::new(),
                task: Mutex::new(None),
                runs: AtomicUsize::new(0),
            }),
        }
    }

    /// Set the subscriber to refresh and the collector to feed.
    pub fn set_target(
        &self,
        subscriber: Arc<dyn Subscriber>,
        collector: Arc<EventCollector>,
        depth: Depth,
    ) {
        *self.inner.target.lock() = Some(Arc::new(RefreshTarget {
            subscriber,
            collector,
            depth,
        }));
    }

    pub fn clear_target(&self) {
        *self.inner.target.lock() = None;
    }

    pub fn family(&self) -> &RefreshFamily {
        &self.inner.family
    }

    pub fn config(&self) -> RefreshConfig {
        self.inner.config.lock().clone()
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.state.lock()
    }

    /// Completed runs, whatever their status.
    pub fn runs(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// Start the background loop on the current tokio runtime.
    ///
    /// The first run happens after one interval. Does nothing if the loop
    /// is already running.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&self) {
        if self.inner.looping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.stopping.store(false, Ordering::SeqCst);
        let seen = self.inner.cancel_count();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.schedule_loop(seen).await });
        *self.inner.task.lock() = Some(handle);
    }

    /// Run one refresh now, waiting for any other member of the family to
    /// finish first.
    ///
    /// A cancellation issued before this call is forgotten; one issued while
    /// waiting for the family or during the run is honored.
    pub async fn run(&self) -> RefreshStatus {
        let seen = self.inner.cancel_count();
        self.inner.run(seen).await
    }

    /// Cut the current wait short and run as soon as possible.
    ///
    /// If a run is in progress another one follows it immediately.
    pub fn schedule_now(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    /// Change the interval, rescheduling a pending wait.
    pub fn set_interval(&self, interval_secs: u64) {
        self.inner.config.lock().interval_secs = interval_secs;
        tracing::debug!(
            family = %self.inner.family.name(),
            interval_secs,
            "Refresh interval changed"
        );
        self.inner.wake.notify_one();
    }

    /// Cancel the pending wait or the run in progress.
    ///
    /// A running refresh stops before its next root. Unless
    /// `restart_on_cancel` is set, the background loop stops too.
    pub fn cancel(&self) {
        self.inner.cancels.fetch_add(1, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    /// Stop the background loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        self.cancel();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Refresh loop ended abnormally");
            }
        }
        self.inner.looping.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("family", &self.inner.family.name())
            .field("state", &self.state())
            .field("runs", &self.runs())
            .finish()
    }
}

impl Inner {
    fn cancel_count(&self) -> u64 {
        self.cancels.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock() = state;
    }

    fn at_rest(&self) -> SchedulerState {
        if self.looping.load(Ordering::SeqCst) {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Idle
        }
    }

    async fn run(&self, seen: u64) -> RefreshStatus {
        let _guard = Arc::clone(&self.family.lock).lock_owned().await;

        let target = self.target.lock().clone();
        let Some(target) = target else {
            tracing::debug!(family = %self.family.name(), "No refresh target, nothing to do");
            return RefreshStatus::Completed { changed: 0 };
        };

        self.set_state(SchedulerState::Running);
        let cancels = Arc::clone(&self.cancels);
        let status = tokio::task::spawn_blocking(move || refresh_roots(&target, &cancels, seen))
            .await
            .unwrap_or_else(|e| {
                RefreshStatus::Failed(MultiStatus {
                    changed: 0,
                    failures: vec![ResourceError {
                        resource: sync_model::ResourcePath::root(),
                        message: e.to_string(),
                    }],
                })
            });

        self.runs.fetch_add(1, Ordering::SeqCst);
        self.set_state(self.at_rest());
        tracing::info!(
            family = %self.family.name(),
            changed = status.changed(),
            ok = status.is_ok(),
            "Refresh finished"
        );
        status
    }

    /// Wait for the interval, a wake-up or a cancellation.
    ///
    /// Returns `false` when the loop should stop.
    async fn wait_for_turn(&self, seen: &mut u64) -> bool {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                return false;
            }
            let count = self.cancel_count();
            if count != *seen {
                if !self.config.lock().restart_on_cancel {
                    return false;
                }
                *seen = count;
            }
            if self.dirty.swap(false, Ordering::SeqCst) {
                return true;
            }

            let interval = self.config.lock().interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => return true,
                // Re-evaluate with the current interval and flags
                _ = self.wake.notified() => continue,
            }
        }
    }

    async fn schedule_loop(&self, mut seen: u64) {
        tracing::debug!(family = %self.family.name(), "Refresh loop started");
        loop {
            self.set_state(SchedulerState::Scheduled);
            if !self.wait_for_turn(&mut seen).await {
                break;
            }

            let status = self.run(seen).await;
            if let RefreshStatus::Cancelled { .. } = status {
                if !self.config.lock().restart_on_cancel || self.stopping.load(Ordering::SeqCst) {
                    break;
                }
                seen = self.cancel_count();
            }
            if !self.config.lock().auto_reschedule && !self.dirty.load(Ordering::SeqCst) {
                break;
            }
        }
        self.looping.store(false, Ordering::SeqCst);
        self.set_state(SchedulerState::Idle);
        tracing::debug!(family = %self.family.name(), "Refresh loop stopped");
    }
}

/// Refresh each root in turn, feeding changes to the collector as they come.
fn refresh_roots(target: &RefreshTarget, cancels: &AtomicU64, seen: u64) -> RefreshStatus {
    let cancelled = || cancels.load(Ordering::SeqCst) != seen;
    let mut changed = 0;
    let mut failures = Vec::new();

    for root in target.subscriber.roots() {
        if cancelled() {
            return RefreshStatus::Cancelled { changed };
        }

        match target
            .subscriber
            .refresh(std::slice::from_ref(&root), target.depth)
        {
            Ok(resources) => {
                changed += resources.len();
                target.collector.enqueue_all(
                    resources
                        .into_iter()
                        .map(|resource| ChangeEvent::changed(resource, Depth::Zero)),
                );
            }
            Err(e) => {
                tracing::warn!(%root, error = %e, "Refresh failed");
                failures.push(ResourceError::new(root, &e));
            }
        }
    }

    if cancelled() {
        RefreshStatus::Cancelled { changed }
    } else if failures.is_empty() {
        RefreshStatus::Completed { changed }
    } else {
        RefreshStatus::Failed(MultiStatus { changed, failures })
    }
}
