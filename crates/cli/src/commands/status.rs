//! Probe and evaluate the capacity without acting on the verdict

use anyhow::Result;
use autopause_lib::engine::PauseCycle;
use autopause_lib::models::{ProvisioningState, Verdict};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::output::{
    color_state, color_verdict, format_minutes, print_fields, print_info, print_json,
    print_warning, FieldRow, OutputFormat,
};

#[derive(Debug, Serialize)]
struct StatusView {
    resource_id: String,
    state: ProvisioningState,
    verdict: Verdict,
    idle_window_minutes: u64,
    resume_guard_minutes: u64,
    metric_name: String,
    checked_at: DateTime<Utc>,
}

pub async fn show_status(cycle: &PauseCycle, format: OutputFormat) -> Result<()> {
    let assessment = cycle.assess().await?;
    let policy = cycle.policy();

    let view = StatusView {
        resource_id: cycle.resource().to_string(),
        state: assessment.descriptor.state,
        verdict: assessment.verdict,
        idle_window_minutes: policy.idle_window.as_secs() / 60,
        resume_guard_minutes: policy.resume_guard_window.as_secs() / 60,
        metric_name: policy.metric_name.clone(),
        checked_at: Utc::now(),
    };

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            print_fields(
                "Capacity Status",
                vec![
                    FieldRow::new("Capacity", cycle.resource().capacity_name.clone()),
                    FieldRow::new("Resource group", cycle.resource().resource_group.clone()),
                    FieldRow::new("State", color_state(view.state)),
                    FieldRow::new("Verdict", color_verdict(view.verdict)),
                    FieldRow::new("Idle window", format_minutes(policy.idle_window)),
                    FieldRow::new("Resume guard", format_minutes(policy.resume_guard_window)),
                    FieldRow::new("Metric", view.metric_name.clone()),
                ],
            );
            println!();
            match view.verdict {
                Verdict::Idle => print_warning("Capacity is idle and would be paused by the next run"),
                Verdict::NotReady => print_info("Capacity is not running, nothing to evaluate"),
                Verdict::RecentlyResumed => print_info("Capacity was resumed recently, idle check deferred"),
                Verdict::Active => print_info("Capacity is in use"),
            }
        }
    }

    Ok(())
}
