//! Observability for the autopause agent
//!
//! Provides:
//! - Prometheus metrics (cycles, verdicts, stage errors, pauses, cycle duration)
//! - Structured JSON logging of cycle events with tracing

use crate::error::CycleError;
use crate::models::{CycleReport, Outcome};
use chrono::{DateTime, Utc};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Cycle duration buckets in seconds. Suspend waits dominate the upper end.
const CYCLE_DURATION_BUCKETS: &[f64] = &[
    0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

static GLOBAL_METRICS: OnceLock<AutopauseMetricsInner> = OnceLock::new();

struct AutopauseMetricsInner {
    cycles: IntCounterVec,
    verdicts: IntCounterVec,
    stage_errors: IntCounterVec,
    pauses: IntCounter,
    cycle_duration_seconds: Histogram,
    last_cycle_timestamp: IntGauge,
}

impl AutopauseMetricsInner {
    fn new() -> Self {
        Self {
            cycles: register_int_counter_vec!(
                "capacity_autopause_cycles_total",
                "Cycles run, by result",
                &["result"]
            )
            .expect("Failed to register cycles_total"),

            verdicts: register_int_counter_vec!(
                "capacity_autopause_verdicts_total",
                "Verdicts reached by the idleness evaluator",
                &["verdict"]
            )
            .expect("Failed to register verdicts_total"),

            stage_errors: register_int_counter_vec!(
                "capacity_autopause_stage_errors_total",
                "Cycle failures, by pipeline stage",
                &["stage"]
            )
            .expect("Failed to register stage_errors_total"),

            pauses: register_int_counter!(
                "capacity_autopause_pauses_total",
                "Suspend operations that completed successfully"
            )
            .expect("Failed to register pauses_total"),

            cycle_duration_seconds: register_histogram!(
                "capacity_autopause_cycle_duration_seconds",
                "Wall time of one probe, evaluate and execute cycle",
                CYCLE_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            last_cycle_timestamp: register_int_gauge!(
                "capacity_autopause_last_cycle_timestamp_seconds",
                "Unix time of the last cycle that completed without error"
            )
            .expect("Failed to register last_cycle_timestamp_seconds"),
        }
    }
}

/// Handle to the process-wide autopause metrics.
///
/// Clones share the same underlying collectors in the default registry.
#[derive(Clone)]
pub struct AutopauseMetrics {
    _private: (),
}

impl Default for AutopauseMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AutopauseMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AutopauseMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AutopauseMetricsInner {
        GLOBAL_METRICS.get_or_init(AutopauseMetricsInner::new)
    }

    /// Record a cycle that ran to completion
    pub fn record_report(&self, report: &CycleReport) {
        let inner = self.inner();
        inner.cycles.with_label_values(&["completed"]).inc();
        inner
            .verdicts
            .with_label_values(&[report.verdict.as_str()])
            .inc();
        if report.outcome == Outcome::Paused {
            inner.pauses.inc();
        }
        inner
            .cycle_duration_seconds
            .observe(report.elapsed.as_secs_f64());
        inner
            .last_cycle_timestamp
            .set(report.finished_at.timestamp());
    }

    /// Record a cycle that failed in one of its stages
    pub fn record_failure(&self, err: &CycleError, elapsed_secs: f64) {
        let inner = self.inner();
        inner.cycles.with_label_values(&["failed"]).inc();
        inner
            .stage_errors
            .with_label_values(&[err.stage().as_str()])
            .inc();
        inner.cycle_duration_seconds.observe(elapsed_secs);
    }

    pub fn cycles(&self, result: &str) -> u64 {
        self.inner().cycles.with_label_values(&[result]).get()
    }

    pub fn stage_errors(&self, stage: &str) -> u64 {
        self.inner().stage_errors.with_label_values(&[stage]).get()
    }

    pub fn pauses(&self) -> u64 {
        self.inner().pauses.get()
    }
}

/// Structured logger for cycle events
#[derive(Clone)]
pub struct CycleLogger {
    resource_id: String,
}

impl CycleLogger {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64, dry_run: bool) {
        info!(
            event = "agent_started",
            resource_id = %self.resource_id,
            agent_version = %version,
            interval_secs = interval_secs,
            dry_run = dry_run,
            "Capacity autopause agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            resource_id = %self.resource_id,
            reason = %reason,
            "Capacity autopause agent shutting down"
        );
    }

    pub fn log_verdict(&self, report: &CycleReport) {
        info!(
            event = "verdict_reached",
            resource_id = %self.resource_id,
            state = %report.state,
            verdict = %report.verdict,
            "Idleness verdict reached"
        );
    }

    pub fn log_pause(&self, report: &CycleReport) {
        match report.outcome {
            Outcome::Paused => info!(
                event = "capacity_paused",
                resource_id = %self.resource_id,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Capacity paused after idle window"
            ),
            Outcome::WouldPause => warn!(
                event = "capacity_paused",
                resource_id = %self.resource_id,
                dry_run = true,
                "Capacity is idle, suspend suppressed by dry run"
            ),
            Outcome::Skipped => {}
        }
    }

    pub fn log_cycle_error(&self, err: &CycleError) {
        error!(
            event = "cycle_failed",
            resource_id = %err.resource_id(),
            stage = %err.stage(),
            error = %err,
            "Autopause cycle failed"
        );
    }

    pub fn log_cycle_complete(&self, ran_at: DateTime<Utc>, elapsed_ms: u64, succeeded: bool) {
        info!(
            event = "cycle_completed",
            resource_id = %self.resource_id,
            elapsed_ms = elapsed_ms,
            succeeded = succeeded,
            "Auto pause ran at: {}",
            ran_at.to_rfc3339()
        );
    }

    /// Full log sequence for a finished cycle
    pub fn log_result(&self, ran_at: DateTime<Utc>, result: &Result<CycleReport, CycleError>) {
        match result {
            Ok(report) => {
                self.log_verdict(report);
                self.log_pause(report);
                self.log_cycle_complete(ran_at, report.elapsed.as_millis() as u64, true);
            }
            Err(err) => {
                self.log_cycle_error(err);
                let elapsed_ms = (Utc::now() - ran_at).num_milliseconds().max(0) as u64;
                self.log_cycle_complete(ran_at, elapsed_ms, false);
            }
        }
    }
}
