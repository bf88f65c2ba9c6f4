//! Schedulable units of plugin work.
//!
//! Each task kind lives in its own module and carries its own execution,
//! rescheduling and weight policy. The shared state (owner, schedule,
//! queue position, activity) lives in [`TaskBase`].

mod collector;
mod configurator;
mod exporter;
mod runner;
mod watcher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::agent::PluginAgent;

pub use collector::CollectorTask;
pub use configurator::ConfiguratorTask;
pub use exporter::ExporterTask;
pub use runner::{StarterTask, StopperTask};
pub use watcher::WatcherTask;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("invalid collector interval 0 seconds")]
    InvalidPeriod,
    #[error("collector interval {0} seconds puts the next run out of range")]
    PeriodOutOfRange(u64),
    #[error("plugin '{plugin}' does not implement {capability}")]
    MissingCapability {
        plugin: String,
        capability: &'static str,
    },
    #[error("cannot calculate next check for itemid {item_id}: {reason}")]
    NextCheck { item_id: u64, reason: String },
}

/// Task kind, doubling as the tie-break rank among tasks scheduled for the
/// same second. Lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TaskKind {
    Configurator = 0,
    Starter = 1,
    Collector = 2,
    Watcher = 3,
    Exporter = 4,
    Stopper = 5,
}

impl TaskKind {
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Configurator => "configurator",
            TaskKind::Starter => "starter",
            TaskKind::Collector => "collector",
            TaskKind::Watcher => "watcher",
            TaskKind::Exporter => "exporter",
            TaskKind::Stopper => "stopper",
        }
    }
}

/// When a task is due: a whole second plus the kind's rank within it.
///
/// Ordering compares the second first and the kind second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduledAt {
    secs: i64,
    kind: TaskKind,
}

impl ScheduledAt {
    /// Truncates `time` to the whole second.
    pub fn at(time: DateTime<Utc>, kind: TaskKind) -> Self {
        Self::from_secs(time.timestamp(), kind)
    }

    pub fn from_secs(secs: i64, kind: TaskKind) -> Self {
        Self { secs, kind }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Due time with the sub-second part cleared.
    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Single comparable value for queues keyed by timestamp: the
    /// nanosecond field carries the kind's rank, not real time. Seconds
    /// outside chrono's range sort after everything else.
    pub fn sort_key(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.secs, self.kind.ordinal())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Completion side of the dispatch authority. Called from task workers,
/// possibly many at once.
pub trait Scheduler: Send + Sync {
    fn finish_task(&self, task: Arc<dyn Task>);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by all task kinds.
pub struct TaskBase {
    plugin: Arc<PluginAgent>,
    kind: TaskKind,
    scheduled: Mutex<ScheduledAt>,
    index: Mutex<Option<usize>>,
    active: AtomicBool,
    recurring: bool,
}

impl TaskBase {
    pub(crate) fn new(plugin: Arc<PluginAgent>, kind: TaskKind, recurring: bool) -> Self {
        Self {
            plugin,
            kind,
            scheduled: Mutex::new(ScheduledAt::from_secs(0, kind)),
            index: Mutex::new(None),
            active: AtomicBool::new(true),
            recurring,
        }
    }

    pub fn plugin(&self) -> &Arc<PluginAgent> {
        &self.plugin
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn scheduled(&self) -> ScheduledAt {
        *lock(&self.scheduled)
    }

    pub(crate) fn schedule_at(&self, secs: i64) {
        *lock(&self.scheduled) = ScheduledAt::from_secs(secs, self.kind);
    }

    /// Due in the second of `now`, ahead of or behind same-second work
    /// according to the task kind.
    pub(crate) fn schedule_now(&self, now: DateTime<Utc>) {
        self.schedule_at(now.timestamp());
    }

    pub fn index(&self) -> Option<usize> {
        *lock(&self.index)
    }

    pub fn set_index(&self, index: Option<usize>) {
        *lock(&self.index) = index;
    }

    pub fn deactivate(&self) {
        // Taken before calling out: the queue may call back into set_index.
        let index = lock(&self.index).take();
        trace!(
            plugin = self.plugin.name(),
            kind = self.kind.as_str(),
            queued = index.is_some(),
            "Deactivating task"
        );
        if let Some(index) = index {
            self.plugin.remove_task(index);
        }
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring
    }
}

pub(crate) fn require_capability(
    plugin: &PluginAgent,
    capability: &'static str,
    present: bool,
) -> Result<(), TaskError> {
    if present {
        Ok(())
    } else {
        Err(TaskError::MissingCapability {
            plugin: plugin.name().to_string(),
            capability,
        })
    }
}

/// A schedulable unit of plugin work.
pub trait Task: Send + Sync {
    fn base(&self) -> &TaskBase;

    /// Launch the work on a blocking worker of the current tokio runtime and
    /// return immediately. The worker calls [`Scheduler::finish_task`] when
    /// the capability returns.
    fn perform(self: Arc<Self>, scheduler: Arc<dyn Scheduler>) -> JoinHandle<()>;

    /// Recompute the due time relative to `now`.
    fn reschedule(&self, now: DateTime<Utc>) -> Result<(), TaskError>;

    /// Capacity consumed while executing.
    fn weight(&self) -> usize {
        1
    }

    fn as_exporter(&self) -> Option<&ExporterTask> {
        None
    }

    fn kind(&self) -> TaskKind {
        self.base().kind()
    }

    fn plugin(&self) -> &Arc<PluginAgent> {
        self.base().plugin()
    }

    fn scheduled(&self) -> ScheduledAt {
        self.base().scheduled()
    }

    fn index(&self) -> Option<usize> {
        self.base().index()
    }

    fn set_index(&self, index: Option<usize>) {
        self.base().set_index(index)
    }

    /// Take the task out of its ready queue, if queued, and mark it
    /// inactive. Work already in flight is not interrupted.
    fn deactivate(&self) {
        self.base().deactivate()
    }

    fn is_active(&self) -> bool {
        self.base().is_active()
    }

    fn is_recurring(&self) -> bool {
        self.base().is_recurring()
    }
}
