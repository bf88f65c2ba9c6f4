use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::{require_capability, Scheduler, Task, TaskBase, TaskError, TaskKind};
use crate::agent::PluginAgent;

/// Applies plugin options. Ranks first within its second so configuration
/// lands before any other work issued at the same time.
pub struct ConfiguratorTask {
    base: TaskBase,
    options: HashMap<String, String>,
}

impl ConfiguratorTask {
    pub fn new(
        plugin: Arc<PluginAgent>,
        options: HashMap<String, String>,
    ) -> Result<Self, TaskError> {
        require_capability(
            &plugin,
            "configurator",
            plugin.plugin().as_configurator().is_some(),
        )?;
        Ok(Self {
            base: TaskBase::new(plugin, TaskKind::Configurator, false),
            options,
        })
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }
}

impl Task for ConfiguratorTask {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn perform(self: Arc<Self>, scheduler: Arc<dyn Scheduler>) -> JoinHandle<()> {
        trace!(plugin = self.plugin().name(), "Executing configurator task");
        tokio::task::spawn_blocking(move || {
            match self.plugin().plugin().as_configurator() {
                Some(configurator) => configurator.configure(&self.options),
                None => warn!(
                    plugin = self.plugin().name(),
                    "Plugin lost its configurator capability"
                ),
            }
            scheduler.finish_task(self);
        })
    }

    fn reschedule(&self, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.base.schedule_now(now);
        Ok(())
    }
}
