//! Show resolved settings

use anyhow::Result;
use autopause_lib::settings::Settings;

use crate::output::{print_fields, print_json, FieldRow, OutputFormat};

/// Print the settings the agent would run with. Secrets never appear.
pub fn show_config(settings: &Settings, format: OutputFormat) -> Result<()> {
    let summary = settings.summary();

    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = summary
                .into_iter()
                .map(|(key, value)| (key.to_string(), serde_json::Value::String(value)))
                .collect();
            print_json(&map)?;
        }
        OutputFormat::Table => {
            let rows = summary
                .into_iter()
                .map(|(key, value)| FieldRow::new(key, value))
                .collect();
            print_fields("Resolved Settings", rows);
        }
    }

    Ok(())
}
