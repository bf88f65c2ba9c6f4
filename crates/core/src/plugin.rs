//! The plugin-facing API.
//!
//! A plugin is any [`Plugin`] implementation; it advertises the capabilities
//! it supports through the `as_*` accessors. The scheduler only ever calls a
//! capability through these accessors, so a plugin that returns `None` for
//! e.g. [`Plugin::as_watcher`] never receives watch requests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PluginError;
use crate::meta::SharedMeta;
use crate::result::{ExportValue, ItemResult, Request};

/// Destination for emitted results. Writes are fire-and-forget.
pub trait ResultWriter: Send + Sync {
    fn write(&self, result: ItemResult);
}

/// Client-owned cache of compiled patterns.
pub trait RegexpMatcher: Send + Sync {
    /// Match `value` against `pattern`. Returns `Ok(None)` when it does not
    /// match, otherwise the expanded `output_template` (or the value itself
    /// when no template is given).
    fn matches(
        &self,
        value: &str,
        pattern: &str,
        output_template: Option<&str>,
    ) -> Result<Option<String>, PluginError>;
}

/// Per-execution handle passed to exporters and watchers.
pub trait ContextProvider: Send + Sync {
    fn client_id(&self) -> u64;
    fn output(&self) -> Arc<dyn ResultWriter>;
    /// Item being processed; 0 when the context is not bound to one item.
    fn item_id(&self) -> u64;
    /// Metadata slot of the item, `None` when there is no single item.
    fn meta(&self) -> Option<SharedMeta>;
    fn global_regexp(&self) -> Arc<dyn RegexpMatcher>;
}

pub trait Collector: Send + Sync {
    fn collect(&self) -> Result<(), PluginError>;
    /// Collection period in seconds.
    fn period(&self) -> u64;
}

pub trait Exporter: Send + Sync {
    fn export(
        &self,
        key: &str,
        params: &[String],
        ctx: &dyn ContextProvider,
    ) -> Result<Option<ExportValue>, PluginError>;
}

pub trait Runner: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

pub trait Watcher: Send + Sync {
    fn watch(&self, requests: &[Request], ctx: &dyn ContextProvider);
}

pub trait Configurator: Send + Sync {
    fn configure(&self, options: &HashMap<String, String>);
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn as_collector(&self) -> Option<&dyn Collector> {
        None
    }

    fn as_exporter(&self) -> Option<&dyn Exporter> {
        None
    }

    fn as_runner(&self) -> Option<&dyn Runner> {
        None
    }

    fn as_watcher(&self) -> Option<&dyn Watcher> {
        None
    }

    fn as_configurator(&self) -> Option<&dyn Configurator> {
        None
    }
}
