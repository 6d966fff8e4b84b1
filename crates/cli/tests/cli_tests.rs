//! CLI integration tests

use std::io::Write;
use std::process::{Command, Output};

const SETTING_VARS: &[&str] = &[
    "AUTOPAUSE_CONFIG",
    "AZURE_SUBSCRIPTION_ID",
    "AZURE_RESOURCE_GROUP_NAME",
    "AZURE_PBI_EMBEDDED_CAPACITY_NAME",
    "IDLE_MINUTES_BEFORE_PAUSE",
    "MINUTES_AFTER_RESUME_BEFORE_IDLE_CHECK",
    "AUTOPAUSE_DRY_RUN",
    "AZURE_TENANT_ID",
    "AZURE_CLIENT_ID",
    "AZURE_CLIENT_SECRET",
    "IDENTITY_ENDPOINT",
    "IDENTITY_HEADER",
];

/// Run the CLI with a clean settings environment plus `env`
fn autopause(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new("cargo");
    command.args(["run", "-q", "-p", "autopause-cli", "--"]).args(args);
    for var in SETTING_VARS {
        command.env_remove(var);
    }
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("Failed to execute command")
}

const TARGET: &[(&str, &str)] = &[
    ("AZURE_SUBSCRIPTION_ID", "00000000-0000-0000-0000-000000000001"),
    ("AZURE_RESOURCE_GROUP_NAME", "rg-analytics"),
    ("AZURE_PBI_EMBEDDED_CAPACITY_NAME", "embedcap01"),
];

#[test]
fn test_cli_help() {
    let output = autopause(&["--help"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Capacity Autopause"), "Should show app name");
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("run"), "Should show run command");
    assert!(stdout.contains("config"), "Should show config command");
}

#[test]
fn test_cli_version() {
    let output = autopause(&["--version"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("autopause"), "Should show binary name");
}

#[test]
fn test_run_help_shows_dry_run() {
    let output = autopause(&["run", "--help"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--dry-run"), "Should show dry-run option");
}

#[test]
fn test_global_options() {
    let output = autopause(&["--help"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--config"), "Should show config option");
    assert!(stdout.contains("AUTOPAUSE_CONFIG"), "Should show env var");
}

#[test]
fn test_config_reports_missing_required_setting() {
    let output = autopause(&["config"], &[]);

    assert!(!output.status.success(), "Missing settings should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("AZURE_SUBSCRIPTION_ID"),
        "Should name the missing setting: {stderr}"
    );
}

#[test]
fn test_config_json_redacts_secret() {
    let mut env = TARGET.to_vec();
    env.extend([
        ("AZURE_TENANT_ID", "tenant-1"),
        ("AZURE_CLIENT_ID", "client-1"),
        ("AZURE_CLIENT_SECRET", "hunter2"),
        ("IDLE_MINUTES_BEFORE_PAUSE", "60"),
    ]);
    let output = autopause(&["--format", "json", "config"], &env);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("hunter2"), "Secret must not be printed");

    let config: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(config["idle_window_minutes"], "60");
    assert_eq!(config["resume_guard_minutes"], "30");
    assert!(config["resource_id"]
        .as_str()
        .unwrap()
        .ends_with("/providers/Microsoft.PowerBIDedicated/capacities/embedcap01"));
}

#[test]
fn test_config_file_is_layered_under_env() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "azure_subscription_id = \"file-sub\"\n\
         azure_resource_group_name = \"file-rg\"\n\
         azure_pbi_embedded_capacity_name = \"file-cap\"\n\
         minutes_after_resume_before_idle_check = 15"
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let output = autopause(
        &["--config", &path, "--format", "json", "config"],
        &[("AZURE_PBI_EMBEDDED_CAPACITY_NAME", "env-cap")],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let config: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    let resource_id = config["resource_id"].as_str().unwrap();
    assert!(resource_id.starts_with("/subscriptions/file-sub/resourceGroups/file-rg/"));
    assert!(resource_id.ends_with("/env-cap"));
    assert_eq!(config["resume_guard_minutes"], "15");
}

#[test]
fn test_invalid_command() {
    let output = autopause(&["invalid-command"], &[]);

    assert!(!output.status.success(), "Invalid command should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

#[test]
fn test_invalid_format() {
    let output = autopause(&["--format", "yaml", "config"], &[]);

    assert!(!output.status.success(), "Unknown format should fail");
}
