use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::{require_capability, Scheduler, Task, TaskBase, TaskError, TaskKind};
use crate::agent::PluginAgent;

/// Periodic collection. The seed spreads collectors of different plugins
/// across their period so they do not fire in the same second.
pub struct CollectorTask {
    base: TaskBase,
    seed: u64,
}

impl CollectorTask {
    pub fn new(plugin: Arc<PluginAgent>, seed: u64) -> Result<Self, TaskError> {
        require_capability(&plugin, "collector", plugin.plugin().as_collector().is_some())?;
        Ok(Self {
            base: TaskBase::new(plugin, TaskKind::Collector, true),
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn collect(&self) {
        let plugin = self.plugin();
        match plugin.plugin().as_collector() {
            Some(collector) => {
                if let Err(e) = collector.collect() {
                    warn!(plugin = plugin.name(), error = %e, "Collector failed");
                }
            }
            None => warn!(plugin = plugin.name(), "Plugin lost its collector capability"),
        }
    }
}

impl Task for CollectorTask {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn perform(self: Arc<Self>, scheduler: Arc<dyn Scheduler>) -> JoinHandle<()> {
        trace!(plugin = self.plugin().name(), "Executing collector task");
        tokio::task::spawn_blocking(move || {
            self.collect();
            scheduler.finish_task(self);
        })
    }

    fn reschedule(&self, now: DateTime<Utc>) -> Result<(), TaskError> {
        let period = self
            .plugin()
            .plugin()
            .as_collector()
            .map_or(0, |collector| collector.period());
        if period == 0 {
            return Err(TaskError::InvalidPeriod);
        }
        let due = i64::try_from(self.seed % period)
            .ok()
            .and_then(|offset| offset.checked_add(1))
            .and_then(|offset| now.timestamp().checked_add(offset))
            .filter(|&secs| DateTime::<Utc>::from_timestamp(secs, 0).is_some())
            .ok_or(TaskError::PeriodOutOfRange(period))?;
        self.base.schedule_at(due);
        Ok(())
    }

    fn weight(&self) -> usize {
        self.plugin().capacity()
    }
}
