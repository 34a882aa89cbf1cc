//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Commands write their report to a
//! caller-supplied writer; logging goes to stderr through `tracing`.

pub mod check;
pub mod config;
pub mod dispatcher;

pub use check::CheckCommand;
pub use config::ConfigCommand;
pub use dispatcher::{Command, CommandContext, CommandDispatcher, CommandResult};
