use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::debug;
use vigil_core::{
    parse_key, value_to_result, ContextProvider, ExportValue, ItemResult, PluginError,
    RegexpMatcher, ResultWriter, SharedMeta,
};

use super::{require_capability, Scheduler, Task, TaskBase, TaskError, TaskKind};
use crate::agent::PluginAgent;
use crate::client::{ClientAccessor, ClientItem, NextCheck, DIRECT_CLIENT_ID};

/// A single poll of one item.
///
/// Every execution emits at most one failure result. What is emitted on
/// success depends on the return value and on whether the client is a
/// direct request:
///
/// | return      | direct request         | scheduled client      |
/// |-------------|------------------------|-----------------------|
/// | nothing     | one empty result       | nothing               |
/// | one value   | one result             | one result            |
/// | N values    | one failure result     | N results, one ts     |
pub struct ExporterTask {
    base: TaskBase,
    item: RwLock<ClientItem>,
    failed: AtomicBool,
    client: Arc<dyn ClientAccessor>,
    meta: SharedMeta,
    output: Arc<dyn ResultWriter>,
    next_check: Arc<dyn NextCheck>,
}

impl ExporterTask {
    pub fn new(
        plugin: Arc<PluginAgent>,
        item: ClientItem,
        client: Arc<dyn ClientAccessor>,
        output: Arc<dyn ResultWriter>,
        meta: SharedMeta,
        next_check: Arc<dyn NextCheck>,
    ) -> Result<Self, TaskError> {
        require_capability(&plugin, "exporter", plugin.plugin().as_exporter().is_some())?;
        let recurring = client.id() != DIRECT_CLIENT_ID;
        Ok(Self {
            base: TaskBase::new(plugin, TaskKind::Exporter, recurring),
            item: RwLock::new(item),
            failed: AtomicBool::new(false),
            client,
            meta,
            output,
            next_check,
        })
    }

    pub fn item(&self) -> ClientItem {
        self.item
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the item definition; takes effect with the next execution
    /// or reschedule.
    pub fn update_item(&self, item: ClientItem) {
        *self.item.write().unwrap_or_else(PoisonError::into_inner) = item;
    }

    pub fn meta(&self) -> SharedMeta {
        Arc::clone(&self.meta)
    }

    /// Whether the last emitted result carried an error.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn is_direct(&self) -> bool {
        self.client.id() == DIRECT_CLIENT_ID
    }

    /// Run one poll and report whether the last emitted result failed.
    fn execute(&self, item_id: u64, key: &str, now: DateTime<Utc>) -> bool {
        let outcome = parse_key(key)
            .map_err(PluginError::from)
            .and_then(|(name, params)| {
                debug!(itemid = item_id, key, "Executing exporter task");
                self.export(&name, &params, item_id, now)
            });

        match outcome {
            Ok(failed) => {
                debug!(itemid = item_id, key, "Executed exporter task");
                failed
            }
            Err(e) => {
                debug!(itemid = item_id, key, error = %e, "Failed to execute exporter task");
                self.output.write(ItemResult::failure(item_id, now, &e));
                true
            }
        }
    }

    fn export(
        &self,
        name: &str,
        params: &[String],
        item_id: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, PluginError> {
        let exporter = self
            .plugin()
            .plugin()
            .as_exporter()
            .ok_or(PluginError::UnsupportedMetric)?;

        let ctx = PollContext {
            task: self,
            item_id,
        };
        match exporter.export(name, params, &ctx)? {
            None => {
                if self.is_direct() {
                    self.output.write(ItemResult::default());
                }
                Ok(false)
            }
            Some(ExportValue::Single(value)) => Ok(self.emit(value_to_result(item_id, now, value))),
            Some(ExportValue::Multiple(_)) if self.is_direct() => Err(PluginError::MultipleValues),
            Some(ExportValue::Multiple(values)) => Ok(values
                .into_iter()
                .fold(false, |_, value| self.emit(value_to_result(item_id, now, value)))),
        }
    }

    fn emit(&self, result: ItemResult) -> bool {
        let failed = result.is_failure();
        self.output.write(result);
        failed
    }
}

impl Task for ExporterTask {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn perform(self: Arc<Self>, scheduler: Arc<dyn Scheduler>) -> JoinHandle<()> {
        // Snapshot the item so a concurrent update does not change it mid-poll.
        let item = self.item();
        tokio::task::spawn_blocking(move || {
            let failed = self.execute(item.item_id, &item.key, Utc::now());
            self.failed.store(failed, Ordering::Release);
            scheduler.finish_task(self);
        })
    }

    fn reschedule(&self, now: DateTime<Utc>) -> Result<(), TaskError> {
        if self.is_direct() {
            self.base.schedule_now(now);
            return Ok(());
        }

        let item = self.item();
        let next = self
            .next_check
            .next_check(
                item.item_id,
                &item.delay,
                now,
                self.failed(),
                self.client.refresh_unsupported(),
            )
            .map_err(|reason| TaskError::NextCheck {
                item_id: item.item_id,
                reason,
            })?;
        self.base.schedule_at(next.timestamp());
        Ok(())
    }

    fn as_exporter(&self) -> Option<&ExporterTask> {
        Some(self)
    }
}

/// What the plugin sees during one poll. Pinned to the item snapshot the
/// results are stamped with.
struct PollContext<'a> {
    task: &'a ExporterTask,
    item_id: u64,
}

impl ContextProvider for PollContext<'_> {
    fn client_id(&self) -> u64 {
        self.task.client.id()
    }

    fn output(&self) -> Arc<dyn ResultWriter> {
        Arc::clone(&self.task.output)
    }

    fn item_id(&self) -> u64 {
        self.item_id
    }

    fn meta(&self) -> Option<SharedMeta> {
        Some(self.task.meta())
    }

    fn global_regexp(&self) -> Arc<dyn RegexpMatcher> {
        self.task.client.global_regexp()
    }
}
