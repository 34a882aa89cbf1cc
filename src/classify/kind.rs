//! The canonical failure taxonomy.

use crate::secrets::Redactor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a resolution attempt failed.
///
/// Every ecosystem maps its own tool's messages onto this set. Nothing
/// ecosystem-specific crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The manifest could not be parsed or evaluated.
    FilesNotEvaluatable,
    /// Resolution ran but no compatible version set exists.
    NotResolvable,
    /// A private source rejected the credentials.
    AuthenticationFailure { source: String },
    /// TLS verification failed for a source.
    CertificateFailure { source: String },
    /// One or more sources could not be contacted at all.
    SourceUnreachable { urls: Vec<String> },
    /// A source answered too slowly.
    SourceTimedOut { source: String },
    /// A VCS branch or ref does not exist.
    GitReferenceNotFound { name: String },
    /// A local path dependency is missing.
    PathDependencyUnreachable { names: Vec<String> },
    /// A recognized tool bug. Downgraded to "no result".
    KnownToolDefect { rule: String },
    /// The sandbox wall clock ran out.
    Timeout,
    /// Nothing matched. Always surfaced.
    Unclassified,
}

impl ErrorKind {
    pub fn tag(&self) -> KindTag {
        match self {
            ErrorKind::FilesNotEvaluatable => KindTag::FilesNotEvaluatable,
            ErrorKind::NotResolvable => KindTag::NotResolvable,
            ErrorKind::AuthenticationFailure { .. } => KindTag::AuthenticationFailure,
            ErrorKind::CertificateFailure { .. } => KindTag::CertificateFailure,
            ErrorKind::SourceUnreachable { .. } => KindTag::SourceUnreachable,
            ErrorKind::SourceTimedOut { .. } => KindTag::SourceTimedOut,
            ErrorKind::GitReferenceNotFound { .. } => KindTag::GitReferenceNotFound,
            ErrorKind::PathDependencyUnreachable { .. } => KindTag::PathDependencyUnreachable,
            ErrorKind::KnownToolDefect { .. } => KindTag::KnownToolDefect,
            ErrorKind::Timeout => KindTag::Timeout,
            ErrorKind::Unclassified => KindTag::Unclassified,
        }
    }

    pub fn is_known_defect(&self) -> bool {
        matches!(self, ErrorKind::KnownToolDefect { .. })
    }

    /// The same kind with every captured field passed through `redactor`.
    pub fn redacted(&self, redactor: &Redactor) -> ErrorKind {
        let all = |values: &[String]| values.iter().map(|v| redactor.redact(v)).collect();
        match self {
            ErrorKind::AuthenticationFailure { source } => ErrorKind::AuthenticationFailure {
                source: redactor.redact(source),
            },
            ErrorKind::CertificateFailure { source } => ErrorKind::CertificateFailure {
                source: redactor.redact(source),
            },
            ErrorKind::SourceTimedOut { source } => ErrorKind::SourceTimedOut {
                source: redactor.redact(source),
            },
            ErrorKind::SourceUnreachable { urls } => ErrorKind::SourceUnreachable { urls: all(urls) },
            ErrorKind::GitReferenceNotFound { name } => ErrorKind::GitReferenceNotFound {
                name: redactor.redact(name),
            },
            ErrorKind::PathDependencyUnreachable { names } => {
                ErrorKind::PathDependencyUnreachable { names: all(names) }
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FilesNotEvaluatable => write!(f, "project files could not be evaluated"),
            ErrorKind::NotResolvable => write!(f, "no resolvable version set"),
            ErrorKind::AuthenticationFailure { source } => {
                write!(f, "authentication failed for {}", source)
            }
            ErrorKind::CertificateFailure { source } => {
                write!(f, "certificate verification failed for {}", source)
            }
            ErrorKind::SourceUnreachable { urls } => {
                write!(f, "unreachable source(s): {}", urls.join(", "))
            }
            ErrorKind::SourceTimedOut { source } => write!(f, "source timed out: {}", source),
            ErrorKind::GitReferenceNotFound { name } => {
                write!(f, "git reference not found: {}", name)
            }
            ErrorKind::PathDependencyUnreachable { names } => {
                write!(f, "path dependency unreachable: {}", names.join(", "))
            }
            ErrorKind::KnownToolDefect { rule } => write!(f, "known tool defect ({})", rule),
            ErrorKind::Timeout => write!(f, "resolution timed out"),
            ErrorKind::Unclassified => write!(f, "unclassified failure"),
        }
    }
}

/// Field-less name of an [`ErrorKind`], as written in classifier rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    FilesNotEvaluatable,
    NotResolvable,
    AuthenticationFailure,
    CertificateFailure,
    SourceUnreachable,
    SourceTimedOut,
    GitReferenceNotFound,
    PathDependencyUnreachable,
    KnownToolDefect,
    Timeout,
    Unclassified,
}

impl KindTag {
    const ALL: &'static [KindTag] = &[
        KindTag::FilesNotEvaluatable,
        KindTag::NotResolvable,
        KindTag::AuthenticationFailure,
        KindTag::CertificateFailure,
        KindTag::SourceUnreachable,
        KindTag::SourceTimedOut,
        KindTag::GitReferenceNotFound,
        KindTag::PathDependencyUnreachable,
        KindTag::KnownToolDefect,
        KindTag::Timeout,
        KindTag::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KindTag::FilesNotEvaluatable => "files_not_evaluatable",
            KindTag::NotResolvable => "not_resolvable",
            KindTag::AuthenticationFailure => "authentication_failure",
            KindTag::CertificateFailure => "certificate_failure",
            KindTag::SourceUnreachable => "source_unreachable",
            KindTag::SourceTimedOut => "source_timed_out",
            KindTag::GitReferenceNotFound => "git_reference_not_found",
            KindTag::PathDependencyUnreachable => "path_dependency_unreachable",
            KindTag::KnownToolDefect => "known_tool_defect",
            KindTag::Timeout => "timeout",
            KindTag::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KindTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| format!("unknown error kind '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_through_text() {
        for tag in KindTag::ALL {
            assert_eq!(tag.as_str().parse::<KindTag>().unwrap(), *tag);
        }
        assert_eq!(
            "authentication-failure".parse::<KindTag>().unwrap(),
            KindTag::AuthenticationFailure
        );
        assert!("boom".parse::<KindTag>().is_err());
    }

    #[test]
    fn display_names_the_source() {
        let kind = ErrorKind::CertificateFailure {
            source: "gems.example.org".into(),
        };
        assert!(kind.to_string().contains("gems.example.org"));
        assert_eq!(kind.tag(), KindTag::CertificateFailure);
    }

    #[test]
    fn known_defect_is_flagged() {
        assert!(ErrorKind::KnownToolDefect { rule: "x".into() }.is_known_defect());
        assert!(!ErrorKind::Unclassified.is_known_defect());
    }
}
