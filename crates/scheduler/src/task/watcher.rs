use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{trace, warn};
use vigil_core::{ContextProvider, RegexpMatcher, Request, ResultWriter, SharedMeta};

use super::{require_capability, Scheduler, Task, TaskBase, TaskError, TaskKind};
use crate::agent::PluginAgent;
use crate::client::ClientAccessor;

/// Hands a batch of item requests to a watching plugin.
///
/// The task never writes results; the plugin does, through the client's
/// output, usually long after `watch` returned. Each dispatch is one-shot:
/// keeping a watch alive is up to the plugin and the client re-issuing it.
pub struct WatcherTask {
    base: TaskBase,
    requests: Vec<Request>,
    client: Arc<dyn ClientAccessor>,
}

impl WatcherTask {
    pub fn new(
        plugin: Arc<PluginAgent>,
        requests: Vec<Request>,
        client: Arc<dyn ClientAccessor>,
    ) -> Result<Self, TaskError> {
        require_capability(&plugin, "watcher", plugin.plugin().as_watcher().is_some())?;
        Ok(Self {
            base: TaskBase::new(plugin, TaskKind::Watcher, false),
            requests,
            client,
        })
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }
}

impl Task for WatcherTask {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn perform(self: Arc<Self>, scheduler: Arc<dyn Scheduler>) -> JoinHandle<()> {
        trace!(
            plugin = self.plugin().name(),
            requests = self.requests.len(),
            "Executing watcher task"
        );
        tokio::task::spawn_blocking(move || {
            match self.plugin().plugin().as_watcher() {
                Some(watcher) => watcher.watch(&self.requests, &*self),
                None => warn!(plugin = self.plugin().name(), "Plugin lost its watcher capability"),
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

impl ContextProvider for WatcherTask {
    fn client_id(&self) -> u64 {
        self.client.id()
    }

    fn output(&self) -> Arc<dyn ResultWriter> {
        self.client.output()
    }

    fn item_id(&self) -> u64 {
        0
    }

    fn meta(&self) -> Option<SharedMeta> {
        None
    }

    fn global_regexp(&self) -> Arc<dyn RegexpMatcher> {
        self.client.global_regexp()
    }
}
