//! The daemon's event loop
//!
//! Everything in the core is single threaded, so the loop runs on a current
//! thread runtime and never hands core state to another task. Each tick
//! drains deferred completions and then runs store housekeeping.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use lumen_core::{
    Clock, ExportMetrics, HousekeepingReport, LumenConfig, SystemClock, TaskQueue,
    UniverseContext, UniverseStore,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct Daemon {
    store: UniverseStore,
    tasks: TaskQueue,
    clock: Rc<dyn Clock>,
    metrics: Rc<ExportMetrics>,
    housekeeping_interval: Duration,
}

impl Daemon {
    pub fn new(config: &LumenConfig) -> Self {
        Self::with_clock(config, Rc::new(SystemClock))
    }

    pub fn with_clock(config: &LumenConfig, clock: Rc<dyn Clock>) -> Self {
        let tasks = TaskQueue::new();
        let metrics = Rc::new(ExportMetrics::new());
        let context = UniverseContext::new(Rc::clone(&clock), Rc::new(tasks.clone()))
            .with_metrics(metrics.clone());

        let mut store = UniverseStore::with_config(context, config);
        // configured universes exist from the start; unused ones are
        // collected on the first pass that finds them idle
        for settings in &config.universes {
            store.get_or_create(settings.id);
            store.mark_for_collection(settings.id);
        }

        Self {
            store,
            tasks,
            clock,
            metrics,
            housekeeping_interval: config.housekeeping.interval(),
        }
    }

    pub fn store(&self) -> &UniverseStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut UniverseStore {
        &mut self.store
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// One pass of the loop
    pub fn tick(&mut self) -> HousekeepingReport {
        let ran = self.tasks.run_pending();
        let report = self.store.housekeeping(self.clock.now());
        if ran > 0 || report != HousekeepingReport::default() {
            debug!(
                tasks = ran,
                discoveries = report.discoveries_started,
                collected = report.universes_collected,
                "Housekeeping"
            );
        }
        report
    }

    /// Tick until `shutdown` resolves, then tear down every universe
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        info!(
            interval_ms = self.housekeeping_interval.as_millis() as u64,
            universes = self.store.universe_count(),
            "Daemon running"
        );

        let mut ticker = tokio::time::interval(self.housekeeping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.store.delete_all();
        self.tasks.run_pending();
        debug!(metrics = ?self.metrics.snapshot(), "Final metrics");
        info!("Daemon stopped");
    }
}
