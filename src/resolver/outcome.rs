//! Resolution outcomes.

use crate::classify::ErrorKind;
use crate::error::{Result, UpliftError};
use crate::version::ResolvedVersion;

/// Which files produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The probe built for the question.
    Probe,
    /// The project's unmodified files, which fail on their own.
    OriginalFiles,
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub kind: ErrorKind,
    /// Redacted tool output.
    pub diagnostic: String,
    pub origin: FailureOrigin,
}

impl ResolutionFailure {
    pub fn new(kind: ErrorKind, diagnostic: impl Into<String>) -> Self {
        Self {
            kind,
            diagnostic: diagnostic.into(),
            origin: FailureOrigin::Probe,
        }
    }

    pub fn from_original_files(mut self) -> Self {
        self.origin = FailureOrigin::OriginalFiles;
        self
    }

    /// The project was broken before anything was changed.
    pub fn is_preexisting(&self) -> bool {
        self.origin == FailureOrigin::OriginalFiles
    }
}

/// What one resolution question produced.
///
/// `Unresolved` means "cannot determine an update"; callers leave the
/// dependency unchanged and do not report an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome<T = ResolvedVersion> {
    Resolved(T),
    Unresolved,
    Failed(ResolutionFailure),
}

impl<T> ResolutionOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResolutionOutcome<U> {
        match self {
            ResolutionOutcome::Resolved(value) => ResolutionOutcome::Resolved(f(value)),
            ResolutionOutcome::Unresolved => ResolutionOutcome::Unresolved,
            ResolutionOutcome::Failed(failure) => ResolutionOutcome::Failed(failure),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> ResolutionOutcome<U>) -> ResolutionOutcome<U> {
        match self {
            ResolutionOutcome::Resolved(value) => f(value),
            ResolutionOutcome::Unresolved => ResolutionOutcome::Unresolved,
            ResolutionOutcome::Failed(failure) => ResolutionOutcome::Failed(failure),
        }
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            ResolutionOutcome::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }

    pub fn failure(&self) -> Option<&ResolutionFailure> {
        match self {
            ResolutionOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Cross into `Result`: a failure becomes [`UpliftError::Resolution`].
    pub fn into_result(self, dependency: &str) -> Result<Option<T>> {
        match self {
            ResolutionOutcome::Resolved(value) => Ok(Some(value)),
            ResolutionOutcome::Unresolved => Ok(None),
            ResolutionOutcome::Failed(failure) => Err(UpliftError::Resolution {
                dependency: dependency.to_string(),
                kind: failure.kind,
                diagnostic: failure.diagnostic,
            }),
        }
    }
}
