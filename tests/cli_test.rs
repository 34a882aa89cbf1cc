//! Integration tests for the uplift binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = "dependencies:\n  rack: \"~> 1.4.0\"\n  sinatra: \">= 2.0\"\n";
const LOCK: &str = "rack: \"1.4.0\"\nsinatra: \"2.0.1\"\n";

/// A project whose resolution tool is the given shell script.
fn setup_project(script: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(".uplift");
    fs::create_dir_all(&dir).unwrap();
    let body: String = script.lines().map(|l| format!("      {}\n", l)).collect();
    fs::write(
        dir.join("config.yml"),
        format!(
            "settings:\n  retry_budget: 0\necosystems:\n  local:\n    builtin_rules: bundler\n    command: |\n{}",
            body
        ),
    )
    .unwrap();
    fs::write(temp.path().join("deps.yml"), MANIFEST).unwrap();
    fs::write(temp.path().join("deps.lock"), LOCK).unwrap();
    temp
}

fn uplift() -> Command {
    let mut cmd = Command::new(cargo_bin("uplift"));
    cmd.env_remove("UPLIFT_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    uplift()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("newest version a dependency can move to"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    uplift()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_requires_a_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    uplift().assert().failure();
    Ok(())
}

#[test]
fn cli_check_without_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    uplift()
        .args(["check", "rack", "--project"])
        .arg(temp.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("No configuration found"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_check_reports_update() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(r#"echo '{"rack": "1.13.0", "sinatra": "2.0.1"}'"#);
    uplift()
        .current_dir(temp.path())
        .args(["check", "rack"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rack 1.4.0 -> 1.13.0"))
        .stdout(predicate::str::contains("deps.yml: ~> 1.4.0 -> ~> 1.13.0"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_check_json_keeps_stdout_clean() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(r#"echo '{"rack": "1.13.0"}'"#);
    let output = uplift()
        .current_dir(temp.path())
        .args(["check", "rack", "--json", "--debug"])
        .output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["status"], "update_available");
    assert_eq!(report["latest_version"], "1.13.0");
    assert_eq!(report["current_version"], "1.4.0");
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_check_widen_ranges() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(r#"echo '{"rack": "1.13.0"}'"#);
    uplift()
        .current_dir(temp.path())
        .args(["check", "rack", "--strategy", "widen_ranges"])
        .assert()
        .success()
        .stdout(predicate::str::contains("~> 1.4.0 -> >= 1.4.0, < 1.14.0"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_check_authentication_failure() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("echo 'Authentication is required for internal.example.org.' >&2\nexit 1");
    uplift()
        .current_dir(temp.path())
        .args(["check", "rack"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "authentication failed for internal.example.org",
        ));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_check_masks_secrets_from_config_env() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("echo \"token $UPLIFT_TEST_TOKEN rejected\" >&2\nexit 1");
    let config = temp.path().join(".uplift/config.yml");
    let mut content = fs::read_to_string(&config)?;
    content.push_str("    env:\n      UPLIFT_TEST_TOKEN: s3cr3t-value\n");
    fs::write(&config, content)?;

    uplift()
        .current_dir(temp.path())
        .args(["check", "rack"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("s3cr3t-value").not())
        .stdout(predicate::str::contains("[REDACTED]"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_check_unknown_ecosystem() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("true");
    uplift()
        .current_dir(temp.path())
        .args(["check", "rack", "--ecosystem", "npm"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown ecosystem: npm"));
    Ok(())
}

#[test]
fn cli_config_shows_merged_yaml() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("true");
    fs::write(
        temp.path().join(".uplift/config.local.yml"),
        "settings:\n  timeout_secs: 42\n",
    )?;
    uplift()
        .current_dir(temp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_secs: 42"))
        .stdout(predicate::str::contains("builtin_rules: bundler"));
    Ok(())
}

#[test]
fn cli_config_override_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let path = temp.path().join("other.yml");
    fs::write(&path, "settings:\n  retry_budget: 9\n")?;
    uplift()
        .current_dir(temp.path())
        .env("UPLIFT_CONFIG", &path)
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"retry_budget\": 9"));
    Ok(())
}
