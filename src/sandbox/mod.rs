//! Isolated, disposable execution of resolution tools.
//!
//! A sandbox is a fresh temporary directory holding a copy of the probe files.
//! The tool runs there with credentials injected for that one process, under
//! a wall-clock limit and a caller-controlled [`CancellationToken`]. The
//! directory is gone by the time [`SandboxRunner::run`] returns, whatever
//! happened inside.

pub mod cancel;
pub mod command;
pub mod inject;
pub mod runner;

pub use cancel::CancellationToken;
pub use command::{ExitState, RawResult, ToolCommand};
pub use inject::{
    ChainedInjector, CredentialInjector, EnvCredentialInjector, NetrcCredentialInjector,
    NoCredentials, SandboxEnv,
};
pub use runner::{SandboxRunner, DEFAULT_TIMEOUT};
