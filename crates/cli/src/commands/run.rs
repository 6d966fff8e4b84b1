//! Run a single autopause cycle

use anyhow::Result;
use autopause_lib::engine::PauseCycle;
use autopause_lib::models::Outcome;

use crate::output::{
    color_outcome, color_state, color_verdict, print_fields, print_info, print_json,
    print_success, print_warning, FieldRow, OutputFormat,
};

pub async fn run_cycle(cycle: &PauseCycle, format: OutputFormat) -> Result<()> {
    if cycle.is_dry_run() && matches!(format, OutputFormat::Table) {
        print_info("Dry run: the capacity will not be suspended");
    }

    let report = cycle.run_cycle().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_fields(
                "Autopause Cycle",
                vec![
                    FieldRow::new("Resource", report.resource_id.clone()),
                    FieldRow::new("State", color_state(report.state)),
                    FieldRow::new("Verdict", color_verdict(report.verdict)),
                    FieldRow::new("Outcome", color_outcome(report.outcome)),
                    FieldRow::new("Elapsed", format!("{}ms", report.elapsed.as_millis())),
                ],
            );
            println!();
            match report.outcome {
                Outcome::Paused => print_success("Capacity paused"),
                Outcome::WouldPause => print_warning("Capacity is idle; dry run left it running"),
                Outcome::Skipped => print_info("No action taken"),
            }
            println!("Auto pause ran at: {}", report.finished_at.to_rfc3339());
        }
    }

    Ok(())
}
