/// Orchestrator module - owns the engine lifecycle
///
/// The engine is an explicit instance built from its injected store, notifier
/// and prober. It:
/// - Runs one cycle at startup (unless disabled) and then one per interval
/// - Lets cycles overlap; the scheduler skips checks still in flight
/// - Stops on request, giving running cycles a grace period before aborting


use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{error, info, warn};

use crate::config::{Config, EngineSection};
use crate::database::{RecordStore, open_store};
use crate::monitoring::{CycleReport, HttpProber, MonitoringScheduler, Prober};
use crate::notify::{self, Notifier};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between the start of consecutive cycles
    pub interval: Duration,
    pub run_on_start: bool,
    /// How long `stop` waits for running cycles
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            run_on_start: true,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl From<&EngineSection> for EngineConfig {
    fn from(section: &EngineSection) -> Self {
        Self {
            interval: Duration::from_secs(section.interval_seconds),
            run_on_start: section.run_on_start,
            shutdown_grace: Duration::from_secs(section.shutdown_grace_seconds),
        }
    }
}

pub struct Engine {
    scheduler: MonitoringScheduler,
    config: EngineConfig,
    shutdown_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        prober: Arc<dyn Prober>,
        config: EngineConfig,
    ) -> Self {
        Self {
            scheduler: MonitoringScheduler::new(store, notifier, prober),
            config,
            shutdown_tx: None,
            handle: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a single cycle outside the interval loop
    pub async fn run_cycle(&self) -> CycleReport {
        self.scheduler.run_cycle().await
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn the interval loop on the current runtime
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            bail!("engine is already running");
        }
        if self.config.interval.is_zero() {
            bail!("cycle interval must be greater than zero");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = self.scheduler.clone();
        let config = self.config.clone();

        info!(
            interval_secs = config.interval.as_secs(),
            run_on_start = config.run_on_start,
            "Starting monitoring engine"
        );
        self.handle = Some(tokio::spawn(run_loop(scheduler, config, shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    /// Signal the loop and wait for it to wind down
    ///
    /// No new cycles start once this is called. Cycles already running get
    /// `shutdown_grace` to finish and are aborted after that.
    pub async fn stop(&mut self) {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };
        let _ = shutdown_tx.send(true);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Engine loop ended abnormally: {e}");
            }
        }
        info!("Monitoring engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run_loop(
    scheduler: MonitoringScheduler,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let first_tick = if config.run_on_start {
        Instant::now()
    } else {
        Instant::now() + config.interval
    };
    let mut ticker = interval_at(first_tick, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycles = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let scheduler = scheduler.clone();
                cycles.spawn(async move { scheduler.run_cycle().await });
            }
            Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                if let Err(e) = joined {
                    error!("Cycle task did not complete: {e}");
                }
            }
        }
    }

    if cycles.is_empty() {
        return;
    }

    info!(cycles = cycles.len(), "Waiting for running cycles to finish");
    let drained = timeout(config.shutdown_grace, async {
        while cycles.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            cycles = cycles.len(),
            grace_secs = config.shutdown_grace.as_secs(),
            "Cycles still running after grace period, aborting them"
        );
        cycles.abort_all();
        while cycles.join_next().await.is_some() {}
    }
}

/// Wire an engine from configuration
pub async fn build_engine(config: &Config) -> Result<Engine> {
    let store = open_store(&config.store).await?;
    let notifier = notify::from_config(&config.notifier)?;
    let prober = Arc::new(HttpProber::new()?);

    info!("Alerts will be delivered via {}", config.notifier.backend);
    Ok(Engine::new(store, notifier, prober, EngineConfig::from(&config.engine)))
}
