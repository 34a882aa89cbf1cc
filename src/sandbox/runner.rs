//! Sandboxed execution of resolution tools.

use super::cancel::{CancellationToken, POLL_INTERVAL};
use super::command::{ExitState, RawResult, ToolCommand};
use super::inject::{CredentialInjector, EnvCredentialInjector};
use crate::error::{Result, UpliftError};
use crate::model::{Credentials, ProjectFile, ProjectFileSet};
use chrono::Utc;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Default wall-clock limit for one run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How long output may keep draining once the tool has ended.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Runs a command against a disposable copy of project files.
///
/// Each [`run`](SandboxRunner::run) gets its own temporary directory. The
/// directory is a [`TempDir`], so it is removed on every way out of `run`:
/// success, failure, timeout, cancellation, an early `?` return or a panic.
///
/// # Example
///
/// ```no_run
/// use uplift::model::{Credentials, ProjectFile, ProjectFileSet};
/// use uplift::sandbox::{SandboxRunner, ToolCommand};
/// use std::time::Duration;
///
/// let files = ProjectFileSet::new(vec![ProjectFile::new("Gemfile", "gem 'rack'")]);
/// let runner = SandboxRunner::new(Duration::from_secs(60));
/// let raw = runner
///     .run(&files, &ToolCommand::new("bundle").arg("lock"), &Credentials::default())
///     .unwrap();
/// assert!(!raw.sandbox_path.exists());
/// ```
#[derive(Clone)]
pub struct SandboxRunner {
    timeout: Duration,
    injector: Arc<dyn CredentialInjector>,
    cancel: CancellationToken,
    base_dir: Option<PathBuf>,
}

impl SandboxRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            injector: Arc::new(EnvCredentialInjector::default()),
            cancel: CancellationToken::new(),
            base_dir: None,
        }
    }

    /// Use a different credential injection mechanism.
    pub fn with_injector(mut self, injector: Arc<dyn CredentialInjector>) -> Self {
        self.injector = injector;
        self
    }

    /// Abort runs when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Create sandboxes under `dir` instead of the system temp directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Materialize `files`, run `command` in them, and tear everything down.
    ///
    /// A tool that exits non-zero or runs out of time is still `Ok`: the
    /// [`RawResult`] says how it ended. `Err` is reserved for not being able to
    /// run at all, and for cancellation.
    pub fn run(
        &self,
        files: &ProjectFileSet,
        command: &ToolCommand,
        credentials: &Credentials,
    ) -> Result<RawResult> {
        self.cancel.check()?;

        let dir = self.create_dir()?;
        let sandbox_path = dir.path().to_path_buf();
        debug!("Sandbox created at {}", sandbox_path.display());

        let result = self.run_in(&dir, files, command, credentials);

        if let Err(e) = dir.close() {
            warn!(
                "Failed to remove sandbox {}: {}",
                sandbox_path.display(),
                e
            );
        } else {
            debug!("Sandbox removed: {}", sandbox_path.display());
        }

        result.map(|mut raw| {
            raw.sandbox_path = sandbox_path;
            raw
        })
    }

    fn create_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("uplift-");
        let dir = match &self.base_dir {
            Some(base) => builder.tempdir_in(base)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn run_in(
        &self,
        dir: &TempDir,
        files: &ProjectFileSet,
        command: &ToolCommand,
        credentials: &Credentials,
    ) -> Result<RawResult> {
        for file in files.files() {
            materialize(dir.path(), file)?;
        }

        let injected = self.injector.inject(dir.path(), credentials)?;
        for file in &injected.files {
            materialize(dir.path(), file)?;
        }

        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments())
            .current_dir(dir.path())
            .envs(command.environment())
            .envs(&injected.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let started_at = Utc::now();
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| UpliftError::CommandSpawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let outcome = self.supervise(&mut child, start);
        // Backgrounded descendants would otherwise hold the pipes open.
        kill_process_group(&mut child);

        let deadline = Instant::now() + OUTPUT_GRACE;
        let stdout = stdout.map(|rx| drain(rx, deadline)).unwrap_or_default();
        let stderr = stderr.map(|rx| drain(rx, deadline)).unwrap_or_default();
        let duration = start.elapsed();

        let exit = outcome?;
        debug!(
            "'{}' finished in {:?} with {:?}",
            command.program(),
            duration,
            exit
        );

        Ok(RawResult {
            stdout,
            stderr,
            exit,
            duration,
            started_at,
            sandbox_path: PathBuf::new(),
        })
    }

    /// Wait for `child` until it exits, times out or is cancelled.
    ///
    /// The caller kills the process group afterwards in every case.
    fn supervise(&self, child: &mut Child, start: Instant) -> Result<ExitState> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(match status.code() {
                    Some(code) => ExitState::Exited(code),
                    None => ExitState::Signalled,
                });
            }
            if self.cancel.is_cancelled() {
                warn!("Sandboxed process cancelled, killing it");
                return Err(UpliftError::Cancelled);
            }
            if start.elapsed() >= self.timeout {
                warn!("Sandboxed process exceeded {:?}, killing it", self.timeout);
                return Ok(ExitState::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Write `file` under `root`, refusing names that would escape it.
fn materialize(root: &Path, file: &ProjectFile) -> Result<()> {
    let relative = Path::new(&file.name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if file.name.is_empty() || escapes {
        return Err(UpliftError::ManifestEdit {
            file: file.name.clone(),
            message: "file name must be a relative path inside the project".to_string(),
        });
    }

    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &file.content)?;
    Ok(())
}

/// Forward `stream` in chunks until it closes.
fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Collect what a reader forwarded, giving up at `deadline`.
fn drain(rx: Receiver<Vec<u8>>, deadline: Instant) -> String {
    let mut buf = Vec::new();
    loop {
        let wait = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Sandboxed output still open after the tool ended, keeping what arrived");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    // The child leads its own group, so -pid reaches every descendant.
    if let Ok(pid) = i32::try_from(child.id()) {
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
