use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;
use vigil_core::Plugin;

use crate::config::{ConfigError, SchedulerConfig};

/// Removal side of a plugin's ready queue. The queue itself belongs to the
/// dispatch authority; tasks only ever ask to be taken out of it.
pub trait ReadyQueue: Send + Sync {
    fn remove(&self, index: usize);
}

/// Runtime wrapper around one plugin instance.
///
/// Tasks hold an `Arc<PluginAgent>` while the queue holds the tasks, so the
/// agent is released once its tasks have been deactivated and dropped.
pub struct PluginAgent {
    plugin: Arc<dyn Plugin>,
    capacity: usize,
    used: AtomicUsize,
    queue: Arc<dyn ReadyQueue>,
}

impl PluginAgent {
    /// A capacity of 0 is raised to 1 so full-weight tasks stay admissible.
    pub fn new(plugin: Arc<dyn Plugin>, capacity: usize, queue: Arc<dyn ReadyQueue>) -> Self {
        Self {
            plugin,
            capacity: capacity.max(1),
            used: AtomicUsize::new(0),
            queue,
        }
    }

    pub fn from_config(
        plugin: Arc<dyn Plugin>,
        config: &SchedulerConfig,
        queue: Arc<dyn ReadyQueue>,
    ) -> Result<Self, ConfigError> {
        let capacity = config.capacity_for(plugin.name());
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity(plugin.name().to_string()));
        }
        Ok(Self::new(plugin, capacity, queue))
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Summed weight of the tasks currently executing.
    pub fn used_capacity(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn remove_task(&self, index: usize) {
        trace!(plugin = self.name(), index, "Removing task from ready queue");
        self.queue.remove(index);
    }

    /// Reserve `weight` units of capacity. Fails without side effects when
    /// the reservation would exceed the plugin's capacity.
    pub fn try_acquire(&self, weight: usize) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(weight).filter(|&total| total <= self.capacity)
            })
            .is_ok()
    }

    /// Return capacity reserved by [`try_acquire`](Self::try_acquire).
    pub fn release(&self, weight: usize) {
        let _ = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(weight))
            });
    }
}

impl fmt::Debug for PluginAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginAgent")
            .field("name", &self.name())
            .field("capacity", &self.capacity)
            .field("used", &self.used_capacity())
            .finish()
    }
}
