//! Command lines and raw results of sandboxed runs.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// An external command to run inside a sandbox.
///
/// # Example
///
/// ```
/// use uplift::sandbox::ToolCommand;
///
/// let cmd = ToolCommand::new("bundle")
///     .arg("lock")
///     .arg("--update")
///     .env("BUNDLE_FROZEN", "false");
/// assert_eq!(cmd.to_string(), "bundle lock --update");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// A script run by the platform shell (`/bin/sh -c` on Unix).
    pub fn shell(script: impl Into<String>) -> Self {
        if cfg!(target_os = "windows") {
            Self::new("cmd.exe").arg("/C").arg(script)
        } else {
            Self::new("/bin/sh").arg("-c").arg(script)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a variable for this command only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a sandboxed process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// Exited on its own with this code.
    Exited(i32),
    /// Killed by a signal it did not get from us.
    Signalled,
    /// Killed after exceeding the wall-clock limit.
    TimedOut,
}

/// Raw outcome of one sandboxed run.
#[derive(Debug, Clone)]
pub struct RawResult {
    pub stdout: String,
    pub stderr: String,
    pub exit: ExitState,
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
    /// Where the sandbox lived. Removed by the time the result is returned.
    pub sandbox_path: PathBuf,
}

impl RawResult {
    /// A result that never touched a real process, for adapters and tests.
    pub fn new(exit: ExitState, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit,
            duration: Duration::ZERO,
            started_at: Utc::now(),
            sandbox_path: PathBuf::new(),
        }
    }

    /// Whether the tool exited with code 0.
    pub fn success(&self) -> bool {
        self.exit == ExitState::Exited(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.exit {
            ExitState::Exited(code) => Some(code),
            _ => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.exit == ExitState::TimedOut
    }

    /// Stdout followed by stderr, the text classifier rules are run against.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}
