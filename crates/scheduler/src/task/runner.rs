use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::{require_capability, Scheduler, Task, TaskBase, TaskError, TaskKind};
use crate::agent::PluginAgent;

/// Brings a plugin into its running state. Takes the whole capacity so
/// nothing else of the plugin runs meanwhile.
pub struct StarterTask {
    base: TaskBase,
}

impl StarterTask {
    pub fn new(plugin: Arc<PluginAgent>) -> Result<Self, TaskError> {
        require_capability(&plugin, "runner", plugin.plugin().as_runner().is_some())?;
        Ok(Self {
            base: TaskBase::new(plugin, TaskKind::Starter, false),
        })
    }
}

impl Task for StarterTask {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn perform(self: Arc<Self>, scheduler: Arc<dyn Scheduler>) -> JoinHandle<()> {
        trace!(plugin = self.plugin().name(), "Executing starter task");
        tokio::task::spawn_blocking(move || {
            match self.plugin().plugin().as_runner() {
                Some(runner) => runner.start(),
                None => warn!(plugin = self.plugin().name(), "Plugin lost its runner capability"),
            }
            scheduler.finish_task(self);
        })
    }

    fn reschedule(&self, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.base.schedule_now(now);
        Ok(())
    }

    fn weight(&self) -> usize {
        self.plugin().capacity()
    }
}

/// Takes a plugin out of its running state; ranks after all other work due
/// in the same second.
pub struct StopperTask {
    base: TaskBase,
}

impl StopperTask {
    pub fn new(plugin: Arc<PluginAgent>) -> Result<Self, TaskError> {
        require_capability(&plugin, "runner", plugin.plugin().as_runner().is_some())?;
        Ok(Self {
            base: TaskBase::new(plugin, TaskKind::Stopper, false),
        })
    }
}

impl Task for StopperTask {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn perform(self: Arc<Self>, scheduler: Arc<dyn Scheduler>) -> JoinHandle<()> {
        trace!(plugin = self.plugin().name(), "Executing stopper task");
        tokio::task::spawn_blocking(move || {
            match self.plugin().plugin().as_runner() {
                Some(runner) => runner.stop(),
                None => warn!(plugin = self.plugin().name(), "Plugin lost its runner capability"),
            }
            scheduler.finish_task(self);
        })
    }

    fn reschedule(&self, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.base.schedule_now(now);
        Ok(())
    }

    fn weight(&self) -> usize {
        self.plugin().capacity()
    }
}
