//! Resolver lifecycle.

use std::fmt;

/// Where a [`VersionResolver`](super::VersionResolver) is in answering one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverState {
    /// Nothing asked yet, or the last question was aborted.
    #[default]
    Idle,

    /// A probe is being built or the tool is running.
    Probing,

    /// Waiting out the backoff before another attempt.
    Retrying,

    /// The last question produced a version.
    Resolved,

    /// The last question produced a classified failure.
    Failed,

    /// The last question hit a known tool defect; no answer.
    Unresolved,
}

impl ResolverState {
    /// Check if this is a terminal state for the current question.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolverState::Resolved | ResolverState::Failed | ResolverState::Unresolved
        )
    }

    /// Whether moving to `next` is a legal step.
    pub fn can_transition_to(&self, next: ResolverState) -> bool {
        use ResolverState::*;
        match (self, next) {
            (Idle, Probing) => true,
            (Probing, Retrying | Resolved | Failed | Unresolved) => true,
            (Retrying, Probing) => true,
            // Aborted by an error or cancellation.
            (Probing | Retrying, Idle) => true,
            // A new question on the same resolver.
            (Resolved | Failed | Unresolved, Probing | Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolverState::Idle => "idle",
            ResolverState::Probing => "probing",
            ResolverState::Retrying => "retrying",
            ResolverState::Resolved => "resolved",
            ResolverState::Failed => "failed",
            ResolverState::Unresolved => "unresolved",
        };
        write!(f, "{}", s)
    }
}
