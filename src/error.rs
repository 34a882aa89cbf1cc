//! Error types for uplift operations.
//!
//! This module defines [`UpliftError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Failures of the external resolution tool are *values*
//!   ([`ResolutionOutcome`](crate::resolver::ResolutionOutcome)), classified into an
//!   [`ErrorKind`] before they reach a caller
//! - `UpliftError::Resolution` is how a classified failure crosses into `Result`-land
//! - Use `anyhow::Error` (via `UpliftError::Other`) for unexpected errors
//! - All errors should provide actionable messages for users

use crate::classify::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for uplift operations.
#[derive(Debug, Error)]
pub enum UpliftError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// No ecosystem adapter is registered under this name.
    #[error("Unknown ecosystem: {name}")]
    UnknownEcosystem { name: String },

    /// A requirement references a file that is not part of the project file set.
    #[error("Dependency '{dependency}' references unknown file '{file}'")]
    UnknownRequirementFile { dependency: String, file: String },

    /// The probe could not be built from the current manifest state.
    #[error("Cannot build probe for '{dependency}': {message}")]
    InvalidProbeState { dependency: String, message: String },

    /// A manifest or lock file could not be read or rewritten.
    #[error("Failed to edit {file}: {message}")]
    ManifestEdit { file: String, message: String },

    /// Version text could not be parsed.
    #[error("Invalid version: {input}")]
    InvalidVersion { input: String },

    /// Constraint text could not be parsed.
    #[error("Invalid constraint '{input}': {message}")]
    InvalidConstraint { input: String, message: String },

    /// A classifier rule pattern failed to compile.
    #[error("Invalid pattern in rule '{rule}': {message}")]
    InvalidPattern { rule: String, message: String },

    /// The resolution tool failed and the failure was classified.
    #[error("Resolution of '{dependency}' failed ({kind}): {diagnostic}")]
    Resolution {
        dependency: String,
        kind: ErrorKind,
        diagnostic: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The external command could not be started.
    #[error("Failed to start '{command}': {message}")]
    CommandSpawn { command: String, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UpliftError {
    /// The classified kind, if this error came out of the resolution tool.
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            UpliftError::Resolution { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Result type alias for uplift operations.
pub type Result<T> = std::result::Result<T, UpliftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_displays_path() {
        let err = UpliftError::ConfigNotFound {
            path: PathBuf::from("/foo/config.yml"),
        };
        assert!(err.to_string().contains("/foo/config.yml"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = UpliftError::ConfigParseError {
            path: PathBuf::from("/config.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/config.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn invalid_probe_state_displays_dependency() {
        let err = UpliftError::InvalidProbeState {
            dependency: "rack".into(),
            message: "pinned to branch 'main'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rack"));
        assert!(msg.contains("branch 'main'"));
    }

    #[test]
    fn resolution_error_carries_source() {
        let err = UpliftError::Resolution {
            dependency: "rack".into(),
            kind: ErrorKind::AuthenticationFailure {
                source: "internal.example.org".into(),
            },
            diagnostic: "Authentication is required".into(),
        };
        assert!(err.to_string().contains("internal.example.org"));
        assert!(matches!(
            err.kind(),
            Some(ErrorKind::AuthenticationFailure { .. })
        ));
    }

    #[test]
    fn kind_is_none_for_other_errors() {
        assert!(UpliftError::Cancelled.kind().is_none());
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: UpliftError = io_err.into();
        assert!(matches!(err, UpliftError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(UpliftError::ConfigValidationError {
                message: "test".into(),
            })
        }
        assert!(returns_error().is_err());
    }
}
