//! Cycle loop
//!
//! Runs a [`PauseCycle`] on a fixed interval until shutdown. Each cycle is
//! awaited before the next tick, so cycles never overlap. Cycle errors are
//! logged and recorded but never stop the loop.

use super::PauseCycle;
use crate::error::CycleError;
use crate::health::HealthRegistry;
use crate::models::CycleReport;
use crate::observability::{AutopauseMetrics, CycleLogger};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default time between cycles (5 minutes)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

pub struct CycleLoop {
    cycle: Arc<PauseCycle>,
    interval: Duration,
    health: HealthRegistry,
    metrics: AutopauseMetrics,
    logger: CycleLogger,
}

impl CycleLoop {
    pub fn new(cycle: Arc<PauseCycle>, health: HealthRegistry, metrics: AutopauseMetrics) -> Self {
        let logger = CycleLogger::new(cycle.resource().to_string());
        Self {
            cycle,
            interval: DEFAULT_CHECK_INTERVAL,
            health,
            metrics,
            logger,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Tick until a shutdown signal arrives. The first cycle runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            resource_id = %self.cycle.resource(),
            "Starting autopause cycle loop"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycle_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycle_count += 1;
                    let result = self.run_once().await;
                    debug!(cycle = cycle_count, ok = result.is_ok(), "Cycle finished");
                }
                _ = shutdown.recv() => {
                    info!(cycles = cycle_count, "Shutting down autopause cycle loop");
                    break;
                }
            }
        }
    }

    /// Run one cycle and record its result in logs, metrics and health
    pub async fn run_once(&self) -> Result<CycleReport, CycleError> {
        let ran_at = Utc::now();
        let start = Instant::now();

        let result = self.cycle.run_cycle().await;

        self.logger.log_result(ran_at, &result);
        match &result {
            Ok(report) => {
                self.metrics.record_report(report);
                self.health.record_report(report).await;
            }
            Err(err) => {
                self.metrics
                    .record_failure(err, start.elapsed().as_secs_f64());
                self.health.record_failure(err).await;
            }
        }

        result
    }
}
