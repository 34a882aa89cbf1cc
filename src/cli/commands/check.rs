//! Check command implementation.
//!
//! The `uplift check` command asks the project's resolution tool how far one
//! dependency can move, or with `--target`, what else must move with it.

use std::io::Write;

use serde::Serialize;
use tracing::debug;

use crate::checker::{Conflict, UpdateChecker};
use crate::classify::KindTag;
use crate::cli::args::CheckArgs;
use crate::config::validate;
use crate::error::{Result, UpliftError};
use crate::model::{Dependency, Requirement};
use crate::resolver::{ResolutionFailure, ResolutionOutcome};
use crate::version::Version;

use super::dispatcher::{Command, CommandContext, CommandResult};

/// The check command implementation.
pub struct CheckCommand {
    context: CommandContext,
    args: CheckArgs,
}

/// What a check found, as printed by `--json`.
#[derive(Debug, Serialize)]
struct CheckReport {
    dependency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<String>,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changes: Vec<Dependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<Conflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<FailureReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    UpdateAvailable,
    UpToDate,
    Unresolved,
    Blocked,
    Failed,
}

#[derive(Debug, Serialize)]
struct FailureReport {
    kind: KindTag,
    message: String,
    diagnostic: String,
    preexisting: bool,
}

impl From<&ResolutionFailure> for FailureReport {
    fn from(failure: &ResolutionFailure) -> Self {
        Self {
            kind: failure.kind.tag(),
            message: failure.kind.to_string(),
            diagnostic: failure.diagnostic.clone(),
            preexisting: failure.is_preexisting(),
        }
    }
}

impl CheckReport {
    fn new(dependency: &Dependency, status: Status) -> Self {
        Self {
            dependency: dependency.name().to_string(),
            current_version: dependency.version().map(str::to_string),
            status,
            latest_version: None,
            changes: Vec::new(),
            conflicts: Vec::new(),
            error: None,
        }
    }

    fn failed(dependency: &Dependency, failure: &ResolutionFailure) -> Self {
        let mut report = Self::new(dependency, Status::Failed);
        report.error = Some(failure.into());
        report
    }

    fn exit_code(&self) -> i32 {
        match self.status {
            Status::Blocked | Status::Failed => 1,
            _ => 0,
        }
    }
}

impl CheckCommand {
    /// Create a new check command.
    pub fn new(context: CommandContext, args: CheckArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &CheckArgs {
        &self.args
    }

    fn latest(&self, checker: &mut UpdateChecker, dependency: &Dependency) -> Result<CheckReport> {
        let outcome =
            checker.updated_dependency(dependency, self.args.policy, self.args.strategy)?;
        Ok(match outcome {
            ResolutionOutcome::Resolved(updated) => {
                let status = if updated.resolved_version() == dependency.resolved_version() {
                    Status::UpToDate
                } else {
                    Status::UpdateAvailable
                };
                let mut report = CheckReport::new(dependency, status);
                report.latest_version = updated.version().map(str::to_string);
                if status == Status::UpdateAvailable {
                    report.changes.push(updated);
                }
                report
            }
            ResolutionOutcome::Unresolved => CheckReport::new(dependency, Status::Unresolved),
            ResolutionOutcome::Failed(failure) => CheckReport::failed(dependency, &failure),
        })
    }

    fn forced(
        &self,
        checker: &mut UpdateChecker,
        dependency: &Dependency,
        target: &Version,
    ) -> Result<CheckReport> {
        let outcome = checker.force(dependency, target, self.args.strategy)?;
        Ok(match outcome {
            ResolutionOutcome::Resolved(changes) => {
                let mut report = CheckReport::new(dependency, Status::UpdateAvailable);
                report.latest_version = Some(target.to_string());
                report.changes = changes;
                report
            }
            ResolutionOutcome::Unresolved => CheckReport::new(dependency, Status::Unresolved),
            ResolutionOutcome::Failed(failure) if failure.is_preexisting() => {
                CheckReport::failed(dependency, &failure)
            }
            ResolutionOutcome::Failed(failure) => {
                let conflicts = checker.conflicting_dependencies(dependency, target)?;
                let mut report = CheckReport::failed(dependency, &failure);
                report.status = Status::Blocked;
                report.latest_version = Some(target.to_string());
                report.conflicts = conflicts;
                report
            }
        })
    }

    fn render(&self, report: &CheckReport, out: &mut dyn Write) -> Result<()> {
        if self.args.json {
            let json =
                serde_json::to_string_pretty(report).map_err(|e| UpliftError::Other(e.into()))?;
            writeln!(out, "{}", json)?;
            return Ok(());
        }

        let name = &report.dependency;
        let current = report.current_version.as_deref().unwrap_or("(unlocked)");
        match report.status {
            Status::UpToDate => writeln!(out, "{} {} is up to date", name, current)?,
            Status::Unresolved => writeln!(out, "{}: no update could be determined", name)?,
            Status::UpdateAvailable => {
                for change in &report.changes {
                    writeln!(
                        out,
                        "{} {} -> {}",
                        change.name(),
                        change.previous_version().unwrap_or("(unlocked)"),
                        change.version().unwrap_or("?")
                    )?;
                    write_requirement_changes(change, out)?;
                }
            }
            Status::Blocked => {
                let target = report.latest_version.as_deref().unwrap_or("?");
                writeln!(out, "{} cannot move to {}", name, target)?;
                for conflict in &report.conflicts {
                    writeln!(
                        out,
                        "  {} {} requires {} {}",
                        conflict.name, conflict.version, name, conflict.violated_constraint
                    )?;
                }
            }
            Status::Failed => {
                if let Some(error) = &report.error {
                    let scope = if error.preexisting {
                        " (the project fails to resolve as it is)"
                    } else {
                        ""
                    };
                    writeln!(out, "{}: {}{}", name, error.message, scope)?;
                    if !error.diagnostic.is_empty() {
                        writeln!(out, "{}", error.diagnostic.trim_end())?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_requirement_changes(change: &Dependency, out: &mut dyn Write) -> Result<()> {
    let before = change.previous_requirements().unwrap_or_default();
    for (old, new) in before.iter().zip(change.requirements()) {
        if old == new {
            continue;
        }
        writeln!(
            out,
            "  {}: {} -> {}",
            new.file,
            requirement_text(old),
            requirement_text(new)
        )?;
    }
    Ok(())
}

fn requirement_text(requirement: &Requirement) -> String {
    let text = requirement.requirement.as_deref().unwrap_or("*");
    match requirement.git_source().and_then(|g| g.revision.as_deref()) {
        Some(revision) => format!("{} @ {}", text, revision),
        None => text.to_string(),
    }
}

impl Command for CheckCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let Some(config) = self.context.load_config(out)? else {
            return Ok(CommandResult::failure(2));
        };
        validate(&config)?;

        let target = self.args.target.as_deref().map(Version::parse).transpose()?;

        let mut checker = UpdateChecker::from_config(
            &config,
            self.args.ecosystem.as_deref(),
            &self.context.project_root,
        )?;

        let Some(dependency) = checker.dependency(&self.args.dependency)? else {
            writeln!(
                out,
                "Dependency '{}' is not declared in the project",
                self.args.dependency
            )?;
            return Ok(CommandResult::failure(1));
        };

        let report = match &target {
            Some(target) => self.forced(&mut checker, &dependency, target)?,
            None => self.latest(&mut checker, &dependency)?,
        };
        debug!(
            "Check of '{}' finished after {} tool run(s)",
            dependency.name(),
            checker.invocations()
        );

        self.render(&report, out)?;
        Ok(match report.exit_code() {
            0 => CommandResult::success(),
            code => CommandResult::failure(code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const MANIFEST: &str = "dependencies:\n  rack: \"~> 1.4.0\"\n  sinatra: \">= 2.0\"\n";
    const LOCK: &str = "rack: \"1.4.0\"\nsinatra: \"2.0.1\"\n";

    fn setup_project(command: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".uplift");
        fs::create_dir_all(&dir).unwrap();
        let script: String = command.lines().map(|l| format!("      {}\n", l)).collect();
        let config = format!(
            "settings:\n  retry_budget: 0\necosystems:\n  local:\n    builtin_rules: bundler\n    command: |\n{}",
            script
        );
        fs::write(dir.join("config.yml"), config).unwrap();
        fs::write(temp.path().join("deps.yml"), MANIFEST).unwrap();
        fs::write(temp.path().join("deps.lock"), LOCK).unwrap();
        temp
    }

    fn run(root: &Path, args: CheckArgs) -> (CommandResult, String) {
        let cmd = CheckCommand::new(CommandContext::new(root), args);
        let mut out = Vec::new();
        let result = cmd.execute(&mut out).unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn args_are_kept() {
        let cmd = CheckCommand::new(CommandContext::new("/tmp"), CheckArgs::new("rack"));
        assert_eq!(cmd.args().dependency, "rack");
    }

    #[test]
    fn missing_config_exits_with_code_2() {
        let temp = TempDir::new().unwrap();
        let (result, output) = run(temp.path(), CheckArgs::new("rack"));
        assert_eq!(result.exit_code, 2);
        assert!(output.contains("No configuration found"));
    }

    #[cfg(unix)]
    #[test]
    fn reports_update_and_requirement_change() {
        let temp = setup_project(r#"echo '{"rack": "1.13.0", "sinatra": "2.0.1"}'"#);
        let (result, output) = run(temp.path(), CheckArgs::new("rack"));
        assert!(result.success, "{}", output);
        assert!(output.contains("rack 1.4.0 -> 1.13.0"));
        assert!(output.contains("deps.yml: ~> 1.4.0 -> ~> 1.13.0"));
    }

    #[cfg(unix)]
    #[test]
    fn reports_up_to_date() {
        let temp = setup_project(r#"echo '{"rack": "1.4.0"}'"#);
        let (result, output) = run(temp.path(), CheckArgs::new("rack"));
        assert!(result.success);
        assert!(output.contains("rack 1.4.0 is up to date"));
    }

    #[cfg(unix)]
    #[test]
    fn unknown_dependency_fails() {
        let temp = setup_project(r#"echo '{}'"#);
        let (result, output) = run(temp.path(), CheckArgs::new("puma"));
        assert_eq!(result.exit_code, 1);
        assert!(output.contains("'puma' is not declared"));
    }

    #[cfg(unix)]
    #[test]
    fn authentication_failure_names_the_host() {
        let temp = setup_project(
            "echo 'Authentication is required for internal.example.org.' >&2\nexit 1",
        );
        let (result, output) = run(temp.path(), CheckArgs::new("rack"));
        assert_eq!(result.exit_code, 1);
        assert!(output.contains("authentication failed for internal.example.org"));
    }

    #[cfg(unix)]
    #[test]
    fn json_report_for_forced_update() {
        let temp = setup_project(r#"echo '{"rack": "2.0.0", "sinatra": "2.0.1"}'"#);
        let mut args = CheckArgs::new("rack");
        args.target = Some("2.0.0".to_string());
        args.json = true;
        let (result, output) = run(temp.path(), args);
        assert!(result.success, "{}", output);

        let report: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(report["status"], "update_available");
        assert_eq!(report["latest_version"], "2.0.0");
        let changes = report["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["name"], "rack");
        assert_eq!(changes[0]["previous_version"], "1.4.0");
    }

    #[test]
    fn invalid_target_is_an_error() {
        let temp = setup_project("true");
        let mut args = CheckArgs::new("rack");
        args.target = Some("not a version".to_string());
        let cmd = CheckCommand::new(CommandContext::new(temp.path()), args);
        let mut out = Vec::new();
        assert!(matches!(
            cmd.execute(&mut out),
            Err(UpliftError::InvalidVersion { .. })
        ));
    }
}
