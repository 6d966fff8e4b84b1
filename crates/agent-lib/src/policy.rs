//! Evaluation policy

use std::time::Duration;

/// Default zero-utilization window before a pause is allowed (45 minutes)
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(45 * 60);

/// Default window after a resume during which idleness is not judged (30 minutes)
pub const DEFAULT_RESUME_GUARD_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Bucket size for metric maxima
pub const METRIC_GRANULARITY: Duration = Duration::from_secs(15 * 60);

/// Longest idle or resume-guard window accepted (one year)
pub const MAX_WINDOW_MINUTES: u64 = 365 * 24 * 60;

/// Utilization metric exposed by Power BI Embedded capacities
pub const DEFAULT_METRIC_NAME: &str = "cpu_metric";

/// Read-only policy the evaluator runs under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPolicy {
    /// Trailing window that must show zero utilization
    pub idle_window: Duration,
    /// Trailing window after a resume during which evaluation is skipped
    pub resume_guard_window: Duration,
    /// Metric queried for utilization
    pub metric_name: String,
    /// Aggregation bucket size
    pub granularity: Duration,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            idle_window: DEFAULT_IDLE_WINDOW,
            resume_guard_window: DEFAULT_RESUME_GUARD_WINDOW,
            metric_name: DEFAULT_METRIC_NAME.to_string(),
            granularity: METRIC_GRANULARITY,
        }
    }
}

impl EvaluationPolicy {
    pub fn from_minutes(idle_minutes: u64, guard_minutes: u64) -> Self {
        Self {
            idle_window: Duration::from_secs(idle_minutes.saturating_mul(60)),
            resume_guard_window: Duration::from_secs(guard_minutes.saturating_mul(60)),
            ..Self::default()
        }
    }

    pub fn with_metric_name(mut self, metric_name: impl Into<String>) -> Self {
        self.metric_name = metric_name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = EvaluationPolicy::default();
        assert_eq!(policy.idle_window, Duration::from_secs(2700));
        assert_eq!(policy.resume_guard_window, Duration::from_secs(1800));
        assert_eq!(policy.granularity, Duration::from_secs(900));
        assert_eq!(policy.metric_name, "cpu_metric");
    }

    #[test]
    fn test_policy_from_minutes_keeps_granularity() {
        let policy = EvaluationPolicy::from_minutes(60, 10).with_metric_name("cpu_workload");
        assert_eq!(policy.idle_window, Duration::from_secs(3600));
        assert_eq!(policy.resume_guard_window, Duration::from_secs(600));
        assert_eq!(policy.granularity, METRIC_GRANULARITY);
        assert_eq!(policy.metric_name, "cpu_workload");
    }

    #[test]
    fn test_policy_from_minutes_saturates() {
        let policy = EvaluationPolicy::from_minutes(u64::MAX, 1);
        assert_eq!(policy.idle_window, Duration::from_secs(u64::MAX));
    }
}
