//! Scripted resolution tool for testing.
//!
//! `ScriptedInvoker` replays queued [`RawResult`]s instead of running a
//! command, and records every file set it was asked about. Clones share the
//! same queue and log, so a test can keep one handle while the ecosystem
//! owns another.
//!
//! # Example
//!
//! ```
//! use uplift::ecosystem::{ResolverInvoker, ScriptedInvoker};
//! use uplift::model::{Credentials, ProjectFileSet};
//! use uplift::sandbox::CancellationToken;
//!
//! let tool = ScriptedInvoker::new();
//! tool.push_success(r#"{"rack": "1.13.0"}"#);
//!
//! let raw = tool
//!     .invoke(&ProjectFileSet::default(), &Credentials::default(), &CancellationToken::new())
//!     .unwrap();
//! assert!(raw.success());
//! assert_eq!(tool.calls(), 1);
//! ```

use super::invoker::ResolverInvoker;
use crate::error::Result;
use crate::model::{Credentials, ProjectFileSet};
use crate::sandbox::{CancellationToken, ExitState, RawResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<RawResult>,
    seen: Vec<ProjectFileSet>,
}

/// A [`ResolverInvoker`] that answers from a queue.
///
/// Once the queue is empty every call fails with exit status 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInvoker {
    script: Arc<Mutex<Script>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw result.
    pub fn push(&self, raw: RawResult) {
        self.lock().replies.push_back(raw);
    }

    /// Queue a successful run printing `stdout`.
    pub fn push_success(&self, stdout: &str) {
        self.push(RawResult::new(ExitState::Exited(0), stdout, ""));
    }

    /// Queue a failed run printing `stderr`.
    pub fn push_failure(&self, stderr: &str) {
        self.push(RawResult::new(ExitState::Exited(1), "", stderr));
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> usize {
        self.lock().seen.len()
    }

    /// File sets passed to each invocation, in order.
    pub fn seen(&self) -> Vec<ProjectFileSet> {
        self.lock().seen.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the script from the others.
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ResolverInvoker for ScriptedInvoker {
    fn invoke(
        &self,
        files: &ProjectFileSet,
        _credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<RawResult> {
        cancel.check()?;
        let mut script = self.lock();
        script.seen.push(files.clone());
        Ok(script
            .replies
            .pop_front()
            .unwrap_or_else(|| RawResult::new(ExitState::Exited(1), "", "script exhausted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(tool: &ScriptedInvoker) -> RawResult {
        tool.invoke(
            &ProjectFileSet::default(),
            &Credentials::default(),
            &CancellationToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn replays_in_order_then_fails() {
        let tool = ScriptedInvoker::new();
        tool.push_failure("boom");
        tool.push_success("{}");

        assert_eq!(invoke(&tool).stderr, "boom");
        assert!(invoke(&tool).success());
        assert_eq!(invoke(&tool).stderr, "script exhausted");
        assert_eq!(tool.calls(), 3);
    }

    #[test]
    fn clones_share_the_script() {
        let tool = ScriptedInvoker::new();
        let handle = tool.clone();
        tool.push_success("{}");
        invoke(&handle);
        assert_eq!(tool.calls(), 1);
    }

    #[test]
    fn cancelled_token_is_not_recorded() {
        let tool = ScriptedInvoker::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = tool.invoke(&ProjectFileSet::default(), &Credentials::default(), &cancel);
        assert!(result.is_err());
        assert_eq!(tool.calls(), 0);
    }
}
