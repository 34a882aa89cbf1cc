//! Uplift - find the newest version a dependency can move to.
//!
//! Uplift never reimplements a package manager's resolver. It builds a
//! modified copy of the project's manifest and lock file (a *probe*), runs
//! the ecosystem's own resolution tool on it inside a disposable sandbox,
//! classifies whatever goes wrong, and rewrites requirement text so it
//! admits the version that came back.
//!
//! # Modules
//!
//! - [`checker`] - The public checking surface
//! - [`classify`] - Failure taxonomy and per-ecosystem classifier rules
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, merging, and validation
//! - [`ecosystem`] - Ecosystem adapters and the resolution tool boundary
//! - [`error`] - Error types and result aliases
//! - [`force`] - Forcing a dependency to a specific version
//! - [`model`] - Dependencies, requirements, project files, credentials
//! - [`probe`] - Probe construction and quirk patches
//! - [`resolver`] - The retrying, memoizing resolution state machine
//! - [`sandbox`] - Isolated tool runs with credential injection
//! - [`secrets`] - Secret redaction for diagnostics
//! - [`updater`] - Requirement rewriting
//! - [`version`] - Version and constraint grammar
//!
//! # Example
//!
//! ```
//! use uplift::updater::rewrite;
//! use uplift::model::UpdateStrategy;
//! use uplift::version::{Constraint, Version};
//!
//! let constraint = Constraint::parse("~> 1.4.0").unwrap();
//! let version = Version::parse("1.13.0").unwrap();
//! let bumped = rewrite(&constraint, &version, UpdateStrategy::BumpVersions);
//! assert_eq!(bumped.to_string(), "~> 1.13.0");
//! ```

pub mod checker;
pub mod classify;
pub mod cli;
pub mod config;
pub mod ecosystem;
pub mod error;
pub mod force;
pub mod model;
pub mod probe;
pub mod resolver;
pub mod sandbox;
pub mod secrets;
pub mod updater;
pub mod version;

pub use error::{Result, UpliftError};
