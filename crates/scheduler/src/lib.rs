//! Task scheduling core of the plugin runtime.
//!
//! Every unit of plugin work (configure, start, collect, watch, export,
//! stop) is a [`Task`]. The dispatch authority pulls due tasks ordered by
//! [`ScheduledAt::sort_key`], admits them against the owning
//! [`PluginAgent`]'s capacity, calls [`Task::perform`] and is called back
//! through [`Scheduler::finish_task`] when the work is done.

pub mod agent;
pub mod client;
pub mod config;
pub mod task;

pub use agent::{PluginAgent, ReadyQueue};
pub use client::{ClientAccessor, ClientItem, NextCheck, DIRECT_CLIENT_ID};
pub use config::{ConfigError, PluginOptions, SchedulerConfig};
pub use task::{
    CollectorTask, ConfiguratorTask, ExporterTask, ScheduledAt, Scheduler, StarterTask,
    StopperTask, Task, TaskBase, TaskError, TaskKind, WatcherTask,
};
