//! Running an ecosystem's resolution tool.

use crate::error::Result;
use crate::model::{Credentials, ProjectFileSet};
use crate::sandbox::{CancellationToken, RawResult, SandboxRunner, ToolCommand};
use tracing::debug;

/// Runs the resolution tool over probe files.
///
/// Closures with the same shape implement this, which keeps scripted tools in
/// tests short.
pub trait ResolverInvoker: Send + Sync {
    fn invoke(
        &self,
        files: &ProjectFileSet,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<RawResult>;
}

impl<F> ResolverInvoker for F
where
    F: Fn(&ProjectFileSet, &Credentials, &CancellationToken) -> Result<RawResult> + Send + Sync,
{
    fn invoke(
        &self,
        files: &ProjectFileSet,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<RawResult> {
        self(files, credentials, cancel)
    }
}

/// Invokes a fixed command inside a fresh sandbox per call.
#[derive(Clone)]
pub struct SandboxInvoker {
    runner: SandboxRunner,
    command: ToolCommand,
}

impl SandboxInvoker {
    pub fn new(runner: SandboxRunner, command: ToolCommand) -> Self {
        Self { runner, command }
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

impl ResolverInvoker for SandboxInvoker {
    fn invoke(
        &self,
        files: &ProjectFileSet,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<RawResult> {
        debug!("Invoking '{}' over {} file(s)", self.command, files.len());
        self.runner
            .clone()
            .with_cancellation(cancel.clone())
            .run(files, &self.command, credentials)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::ProjectFile;
    use crate::sandbox::ExitState;
    use std::time::Duration;

    #[test]
    fn sandbox_invoker_runs_command_over_files() {
        let invoker = SandboxInvoker::new(
            SandboxRunner::new(Duration::from_secs(10)),
            ToolCommand::shell("cat deps.yml"),
        );
        let files = ProjectFileSet::new(vec![ProjectFile::new("deps.yml", "rack: 1.0\n")]);
        let raw = invoker
            .invoke(&files, &Credentials::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(raw.stdout, "rack: 1.0\n");
    }

    #[test]
    fn closures_are_invokers() {
        let invoker = |_: &ProjectFileSet, _: &Credentials, _: &CancellationToken| -> Result<RawResult> {
            Ok(RawResult::new(ExitState::Exited(0), "{}", ""))
        };
        let raw = invoker
            .invoke(
                &ProjectFileSet::default(),
                &Credentials::default(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(raw.success());
    }
}
