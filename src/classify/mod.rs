//! Mapping raw tool failures onto the canonical [`ErrorKind`] set.
//!
//! - [`ErrorKind`] - what went wrong, with the offending source where known
//! - [`ClassifierRuleSet`] - ordered rules an ecosystem supplies
//! - [`classify`] - the single entry point resolvers call

pub mod kind;
pub mod rules;

pub use kind::{ErrorKind, KindTag};
pub use rules::{ClassifierRule, ClassifierRuleSet};

use crate::sandbox::{ExitState, RawResult};
use crate::secrets::Redactor;
use tracing::{debug, warn};

/// Longest diagnostic kept in an outcome, in bytes.
pub const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// What the classifier made of a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The failure output carried a usable result after all.
    Recovered(String),
    Failed {
        kind: ErrorKind,
        retryable: bool,
        /// Redacted, truncated tool output.
        diagnostic: String,
    },
}

impl Classification {
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Classification::Failed { kind, .. } => Some(kind),
            Classification::Recovered(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Classification::Failed { retryable: true, .. })
    }
}

/// Classify a failed run.
///
/// Order of precedence: a timed-out run is always [`ErrorKind::Timeout`];
/// then a result embedded in the output is recovered; then the first matching
/// rule wins; anything else is [`ErrorKind::Unclassified`].
///
/// # Example
///
/// ```
/// use uplift::classify::{classify, ClassifierRuleSet, ErrorKind};
/// use uplift::sandbox::{ExitState, RawResult};
/// use uplift::secrets::Redactor;
///
/// let raw = RawResult::new(
///     ExitState::Exited(1),
///     "",
///     "Authentication is required for internal.example.org.",
/// );
/// let rules = ClassifierRuleSet::builtin("bundler").unwrap();
/// let result = classify(&raw, &rules, &Redactor::new());
/// assert_eq!(
///     result.kind(),
///     Some(&ErrorKind::AuthenticationFailure { source: "internal.example.org".into() })
/// );
/// ```
pub fn classify(raw: &RawResult, rules: &ClassifierRuleSet, redactor: &Redactor) -> Classification {
    let output = raw.combined_output();
    let diagnostic = truncate_tail(&redactor.redact(&output), MAX_DIAGNOSTIC_BYTES);

    if raw.exit == ExitState::TimedOut {
        return Classification::Failed {
            kind: ErrorKind::Timeout,
            retryable: rules.retries_timeouts(),
            diagnostic,
        };
    }

    if let Some(payload) = embedded_result(&output, rules) {
        warn!(
            "Tool exited with {:?} but printed a result; treating it as resolved",
            raw.exit
        );
        return Classification::Recovered(payload);
    }

    match rules.first_match(&output) {
        Some(rule) => {
            let kind = rule
                .classify(&output)
                .unwrap_or(ErrorKind::Unclassified)
                .redacted(redactor);
            debug!("Rule '{}' classified failure as {}", rule.name(), kind.tag());
            Classification::Failed {
                kind,
                retryable: rule.is_retryable(),
                diagnostic,
            }
        }
        None => {
            debug!("No rule matched failure output");
            Classification::Failed {
                kind: ErrorKind::Unclassified,
                retryable: false,
                diagnostic,
            }
        }
    }
}

fn embedded_result(output: &str, rules: &ClassifierRuleSet) -> Option<String> {
    let caps = rules.embedded_result()?.captures(output)?;
    let payload = caps.name("result").or_else(|| caps.get(1))?;
    let payload = payload.as_str().trim();
    (!payload.is_empty()).then(|| payload.to_string())
}

/// Keep the last `max` bytes of `text`, on a character boundary.
pub(crate) fn truncate_tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
