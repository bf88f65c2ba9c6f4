//! Drives tasks through a minimal dispatch loop: same-second ordering,
//! capacity admission and completion callbacks working together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;
use vigil_core::{
    new_shared_meta, Configurator, ContextProvider, ExportValue, Exporter, ItemResult,
    PatternCache, Plugin, PluginError, RegexpMatcher, ResultWriter, Runner,
};
use vigil_scheduler::{
    ClientAccessor, ClientItem, ConfiguratorTask, ExporterTask, NextCheck, PluginAgent,
    ReadyQueue, Scheduler, SchedulerConfig, StarterTask, StopperTask, Task, TaskKind,
    DIRECT_CLIENT_ID,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Pulse {
    events: Mutex<Vec<&'static str>>,
    exporting: AtomicUsize,
    max_exporting: AtomicUsize,
    stopped_while_exporting: AtomicBool,
}

impl Pulse {
    fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl Plugin for Pulse {
    fn name(&self) -> &str {
        "Pulse"
    }

    fn as_exporter(&self) -> Option<&dyn Exporter> {
        Some(self)
    }

    fn as_runner(&self) -> Option<&dyn Runner> {
        Some(self)
    }

    fn as_configurator(&self) -> Option<&dyn Configurator> {
        Some(self)
    }
}

impl Exporter for Pulse {
    fn export(
        &self,
        _key: &str,
        _params: &[String],
        ctx: &dyn ContextProvider,
    ) -> Result<Option<ExportValue>, PluginError> {
        let now = self.exporting.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_exporting.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push("export");
        std::thread::sleep(Duration::from_millis(20));
        self.exporting.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(ExportValue::single(ctx.item_id())))
    }
}

impl Runner for Pulse {
    fn start(&self) {
        self.events.lock().unwrap().push("start");
    }

    fn stop(&self) {
        if self.exporting.load(Ordering::SeqCst) > 0 {
            self.stopped_while_exporting.store(true, Ordering::SeqCst);
        }
        self.events.lock().unwrap().push("stop");
    }
}

impl Configurator for Pulse {
    fn configure(&self, _options: &HashMap<String, String>) {
        self.events.lock().unwrap().push("configure");
    }
}

struct NoQueue;

impl ReadyQueue for NoQueue {
    fn remove(&self, _index: usize) {}
}

#[derive(Default)]
struct Sink(Mutex<Vec<ItemResult>>);

impl ResultWriter for Sink {
    fn write(&self, result: ItemResult) {
        self.0.lock().unwrap().push(result);
    }
}

struct DirectClient {
    output: Arc<Sink>,
    patterns: Arc<PatternCache>,
}

impl ClientAccessor for DirectClient {
    fn id(&self) -> u64 {
        DIRECT_CLIENT_ID
    }

    fn output(&self) -> Arc<dyn ResultWriter> {
        self.output.clone()
    }

    fn global_regexp(&self) -> Arc<dyn RegexpMatcher> {
        self.patterns.clone()
    }

    fn refresh_unsupported(&self) -> u32 {
        600
    }
}

/// Completion callback forwarding finished tasks to the dispatch loop.
struct Completions(mpsc::UnboundedSender<Arc<dyn Task>>);

impl Scheduler for Completions {
    fn finish_task(&self, task: Arc<dyn Task>) {
        let _ = self.0.send(task);
    }
}

fn never_next_check() -> Arc<dyn NextCheck> {
    Arc::new(
        |_: u64, _: &str, now: DateTime<Utc>, _: bool, _: u32| -> Result<DateTime<Utc>, String> {
            Ok(now)
        },
    )
}

/// Admit ready tasks in order while they fit; stop at the first that does
/// not so later work never overtakes it.
async fn dispatch(agent: &PluginAgent, mut ready: Vec<Arc<dyn Task>>) -> Vec<TaskKind> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let completions: Arc<dyn Scheduler> = Arc::new(Completions(tx));
    ready.sort_by_key(|t| t.scheduled().sort_key());

    let mut started = Vec::new();
    let mut running = 0;
    while !ready.is_empty() || running > 0 {
        while let Some(task) = ready.first() {
            if !agent.try_acquire(task.weight()) {
                break;
            }
            let task = ready.remove(0);
            started.push(task.kind());
            assert!(agent.used_capacity() <= agent.capacity());
            drop(task.perform(completions.clone()));
            running += 1;
        }

        let done = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("task never reported completion")
            .expect("completion channel closed");
        done.plugin().release(done.weight());
        done.deactivate();
        running -= 1;
    }
    started
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_runs_in_rank_order_within_capacity() {
    init_tracing();

    let config = SchedulerConfig::from_toml_str("[plugins.Pulse]\ncapacity = 2\n").unwrap();
    let pulse = Arc::new(Pulse::default());
    let agent =
        Arc::new(PluginAgent::from_config(pulse.clone(), &config, Arc::new(NoQueue)).unwrap());
    let client = Arc::new(DirectClient {
        output: Arc::new(Sink::default()),
        patterns: Arc::new(PatternCache::new()),
    });
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    let mut ready: Vec<Arc<dyn Task>> = vec![
        Arc::new(StopperTask::new(agent.clone()).unwrap()),
        Arc::new(StarterTask::new(agent.clone()).unwrap()),
    ];
    for item_id in 1..=3 {
        ready.push(Arc::new(
            ExporterTask::new(
                agent.clone(),
                ClientItem {
                    item_id,
                    delay: "0".into(),
                    key: "pulse.value".into(),
                },
                client.clone(),
                client.output.clone(),
                new_shared_meta(),
                never_next_check(),
            )
            .unwrap(),
        ));
    }
    ready.push(Arc::new(
        ConfiguratorTask::new(agent.clone(), config.options_for("Pulse")).unwrap(),
    ));
    for task in &ready {
        task.reschedule(now).unwrap();
    }

    let started = dispatch(&agent, ready).await;

    assert_eq!(
        started,
        vec![
            TaskKind::Configurator,
            TaskKind::Starter,
            TaskKind::Exporter,
            TaskKind::Exporter,
            TaskKind::Exporter,
            TaskKind::Stopper,
        ]
    );
    let events = pulse.events();
    assert_eq!(events.first(), Some(&"configure"));
    assert_eq!(events[1], "start");
    assert_eq!(events.last(), Some(&"stop"));
    assert!(pulse.max_exporting.load(Ordering::SeqCst) <= 2);
    assert!(!pulse.stopped_while_exporting.load(Ordering::SeqCst));
    assert_eq!(agent.used_capacity(), 0);

    let mut ids: Vec<u64> = client.output.0.lock().unwrap().iter().map(|r| r.item_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
}
