//! Classifier rules and the built-in rule sets.
//!
//! A rule is a regular expression plus the [`KindTag`] it produces. Fields of
//! the produced [`ErrorKind`] come from named capture groups:
//!
//! | Kind | Capture group |
//! |---|---|
//! | `authentication_failure`, `certificate_failure`, `source_timed_out` | `source` |
//! | `source_unreachable` | `url` (every match is collected) |
//! | `git_reference_not_found` | `name` |
//! | `path_dependency_unreachable` | `name` (every match is collected) |
//!
//! A rule without the group falls back to the whole matched text.

use super::kind::{ErrorKind, KindTag};
use crate::error::{Result, UpliftError};
use regex::Regex;
use std::sync::LazyLock;

/// One ordered pattern matcher.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    name: String,
    pattern: Regex,
    kind: KindTag,
    retryable: bool,
}

impl ClassifierRule {
    /// Compile a rule. Fails with `InvalidPattern` on a bad expression.
    pub fn new(name: impl Into<String>, pattern: &str, kind: KindTag) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| UpliftError::InvalidPattern {
            rule: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            pattern,
            kind,
            retryable: false,
        })
    }

    /// Mark failures matching this rule as transient.
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> KindTag {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn is_match(&self, output: &str) -> bool {
        self.pattern.is_match(output)
    }

    /// Build the kind this rule assigns to `output`, or `None` if it does not match.
    pub fn classify(&self, output: &str) -> Option<ErrorKind> {
        let first = self.pattern.captures(output)?;
        let field = |caps: &regex::Captures, group: &str| captured(caps, group);

        let kind = match self.kind {
            KindTag::FilesNotEvaluatable => ErrorKind::FilesNotEvaluatable,
            KindTag::NotResolvable => ErrorKind::NotResolvable,
            KindTag::AuthenticationFailure => ErrorKind::AuthenticationFailure {
                source: field(&first, "source"),
            },
            KindTag::CertificateFailure => ErrorKind::CertificateFailure {
                source: field(&first, "source"),
            },
            KindTag::SourceTimedOut => ErrorKind::SourceTimedOut {
                source: field(&first, "source"),
            },
            KindTag::GitReferenceNotFound => ErrorKind::GitReferenceNotFound {
                name: field(&first, "name"),
            },
            KindTag::SourceUnreachable => ErrorKind::SourceUnreachable {
                urls: self.collect_all(output, "url"),
            },
            KindTag::PathDependencyUnreachable => ErrorKind::PathDependencyUnreachable {
                names: self.collect_all(output, "name"),
            },
            KindTag::KnownToolDefect => ErrorKind::KnownToolDefect {
                rule: self.name.clone(),
            },
            KindTag::Timeout => ErrorKind::Timeout,
            KindTag::Unclassified => ErrorKind::Unclassified,
        };
        Some(kind)
    }

    /// Every distinct capture of `group`, in order of appearance.
    fn collect_all(&self, output: &str, group: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for caps in self.pattern.captures_iter(output) {
            let value = captured(&caps, group);
            if !value.is_empty() && !values.contains(&value) {
                values.push(value);
            }
        }
        values
    }
}

/// Text of `group`, or the whole match, with URL userinfo removed.
fn captured(caps: &regex::Captures, group: &str) -> String {
    caps.name(group)
        .or_else(|| caps.get(0))
        .map(|m| strip_userinfo(m.as_str().trim()))
        .unwrap_or_default()
}

/// Drop `user:password@` from a URL-looking value.
fn strip_userinfo(value: &str) -> String {
    USERINFO.replace_all(value, "${scheme}").into_owned()
}

static USERINFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*://)[^/@\s]+@").unwrap()
});

/// An ecosystem's complete classification configuration.
///
/// Rules are tried in order and the first match wins. Sets are plain
/// immutable values handed to a resolver at construction.
#[derive(Debug, Clone, Default)]
pub struct ClassifierRuleSet {
    rules: Vec<ClassifierRule>,
    embedded_result: Option<Regex>,
    conflict_pattern: Option<Regex>,
    retry_timeouts: bool,
}

impl ClassifierRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: ClassifierRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append all rules of `other`, keeping this set's patterns where both have one.
    pub fn extended(mut self, other: &ClassifierRuleSet) -> Self {
        self.rules.extend(other.rules.iter().cloned());
        if self.embedded_result.is_none() {
            self.embedded_result = other.embedded_result.clone();
        }
        if self.conflict_pattern.is_none() {
            self.conflict_pattern = other.conflict_pattern.clone();
        }
        self.retry_timeouts |= other.retry_timeouts;
        self
    }

    /// Pattern locating a result printed alongside a failure.
    ///
    /// The payload is the `result` capture group, or group 1.
    pub fn with_embedded_result(mut self, pattern: &str) -> Result<Self> {
        self.embedded_result = Some(compile("embedded_result", pattern)?);
        Ok(self)
    }

    /// Pattern extracting conflict records with `name`, `version` and
    /// `constraint` groups.
    pub fn with_conflict_pattern(mut self, pattern: &str) -> Result<Self> {
        self.conflict_pattern = Some(compile("conflict_pattern", pattern)?);
        Ok(self)
    }

    /// Whether sandbox timeouts are worth retrying.
    pub fn with_retry_timeouts(mut self, retry: bool) -> Self {
        self.retry_timeouts = retry;
        self
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    pub fn embedded_result(&self) -> Option<&Regex> {
        self.embedded_result.as_ref()
    }

    pub fn conflict_pattern(&self) -> Option<&Regex> {
        self.conflict_pattern.as_ref()
    }

    pub fn retries_timeouts(&self) -> bool {
        self.retry_timeouts
    }

    /// First rule matching `output`.
    pub fn first_match(&self, output: &str) -> Option<&ClassifierRule> {
        self.rules.iter().find(|r| r.is_match(output))
    }

    /// A built-in rule set by name (`bundler`, `npm`, `cargo`).
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "bundler" => Some(BUNDLER.clone()),
            "npm" => Some(NPM.clone()),
            "cargo" => Some(CARGO.clone()),
            _ => None,
        }
    }

    /// Names accepted by [`builtin`](Self::builtin).
    pub fn builtin_names() -> &'static [&'static str] {
        &["bundler", "npm", "cargo"]
    }

    fn from_table(table: &[RuleRow], conflict: Option<&str>) -> Result<Self> {
        let mut set = Self::new();
        for (name, pattern, kind, retryable) in table {
            set = set.with_rule(ClassifierRule::new(*name, pattern, *kind)?.retryable(*retryable));
        }
        if let Some(pattern) = conflict {
            set = set.with_conflict_pattern(pattern)?;
        }
        Ok(set)
    }
}

fn compile(rule: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| UpliftError::InvalidPattern {
        rule: rule.to_string(),
        message: e.to_string(),
    })
}

type RuleRow = (&'static str, &'static str, KindTag, bool);

// A bare host (with optional port), stopping before trailing punctuation.
// Userinfo in front of it is skipped.
macro_rules! host {
    () => {
        r"(?:[^@\s/]+@)?(?P<source>[A-Za-z0-9][A-Za-z0-9.\-:]*[A-Za-z0-9])"
    };
}

// A full URL, stopping before trailing punctuation.
macro_rules! url {
    () => {
        r"(?P<url>[A-Za-z0-9][A-Za-z0-9.\-:/@_%]*[A-Za-z0-9/])"
    };
}

macro_rules! builtin_rules {
    ($name:ident, $table:expr, $conflict:expr) => {
        static $name: LazyLock<ClassifierRuleSet> = LazyLock::new(|| {
            ClassifierRuleSet::from_table($table, $conflict).unwrap()
        });
    };
}

const BUNDLER_RULES: &[RuleRow] = &[
    (
        "bundler_auth_required",
        concat!(r"Authentication is required for (?:https?://)?", host!()),
        KindTag::AuthenticationFailure,
        false,
    ),
    (
        "bundler_bad_credentials",
        concat!(r"Bad username or password for (?:https?://)?", host!()),
        KindTag::AuthenticationFailure,
        false,
    ),
    (
        "bundler_certificate",
        concat!(r"Could not verify the SSL certificate for (?:https?://)?", host!()),
        KindTag::CertificateFailure,
        false,
    ),
    (
        "bundler_source_timeout",
        concat!(
            r"(?:Net::OpenTimeout|Net::ReadTimeout|timed out)[^\n]*?https?://",
            host!()
        ),
        KindTag::SourceTimedOut,
        true,
    ),
    (
        "bundler_fetch_failed",
        concat!(r"Could not fetch specs from ", url!()),
        KindTag::SourceUnreachable,
        true,
    ),
    (
        "bundler_git_revision",
        r"Revision (?P<name>\S+) does not exist in the repository",
        KindTag::GitReferenceNotFound,
        false,
    ),
    (
        "bundler_git_ref",
        r"couldn't find remote ref (?P<name>\S+)",
        KindTag::GitReferenceNotFound,
        false,
    ),
    (
        "bundler_path_missing",
        r"The path `(?P<name>[^`]+)` does not exist",
        KindTag::PathDependencyUnreachable,
        false,
    ),
    (
        "bundler_gemfile_error",
        r"There was an error (?:parsing|while loading)|Gemfile syntax error",
        KindTag::FilesNotEvaluatable,
        false,
    ),
    (
        "bundler_conflict",
        r"Bundler could not find compatible versions|Could not find gem '|could not find gem",
        KindTag::NotResolvable,
        false,
    ),
];

const BUNDLER_CONFLICT: &str = r"(?m)(?P<name>[\w.\-]+) \((?P<version>[\w.\-]+)\) was resolved to [\w.\-]+, which depends on\s+[\w.\-]+ \((?P<constraint>[^)]+)\)";

const NPM_RULES: &[RuleRow] = &[
    (
        "npm_arborist_edges_out",
        r"Cannot read properties of null \(reading 'edgesOut'\)",
        KindTag::KnownToolDefect,
        false,
    ),
    (
        "npm_unauthorized",
        concat!(r"(?s)\bE40[13]\b.*?(?:GET|PUT) https?://", host!()),
        KindTag::AuthenticationFailure,
        false,
    ),
    (
        "npm_certificate",
        concat!(
            r"request to https?://",
            host!(),
            r"[^\n]*?(?:UNABLE_TO_VERIFY_LEAF_SIGNATURE|SELF_SIGNED_CERT_IN_CHAIN|CERT_HAS_EXPIRED|certificate)"
        ),
        KindTag::CertificateFailure,
        false,
    ),
    (
        "npm_source_timeout",
        concat!(
            r"request to https?://",
            host!(),
            r"\S* failed, reason: [^\n]*(?:ETIMEDOUT|ESOCKETTIMEDOUT)"
        ),
        KindTag::SourceTimedOut,
        true,
    ),
    (
        "npm_unreachable",
        concat!(r"request to ", url!(), r" failed"),
        KindTag::SourceUnreachable,
        true,
    ),
    (
        "npm_git_ref",
        r"couldn't find remote ref (?P<name>\S+)",
        KindTag::GitReferenceNotFound,
        false,
    ),
    (
        "npm_path_missing",
        r"ENOENT[^\n]*?open '(?P<name>[^']+)/package\.json'",
        KindTag::PathDependencyUnreachable,
        false,
    ),
    (
        "npm_json_parse",
        r"EJSONPARSE|Unexpected token [^\n]* in JSON",
        KindTag::FilesNotEvaluatable,
        false,
    ),
    (
        "npm_conflict",
        r"ERESOLVE|ETARGET|No matching version found for|\bE404\b",
        KindTag::NotResolvable,
        false,
    ),
];

const NPM_CONFLICT: &str =
    r#"(?m)peer \S+@"(?P<constraint>[^"]+)" from (?P<name>@?[^@\s]+)@(?P<version>\S+)"#;

const CARGO_RULES: &[RuleRow] = &[
    (
        "cargo_git_auth",
        concat!(
            r"(?s)failed to authenticate when downloading repository.*?(?:https?|ssh)://(?:[^@\s]+@)?",
            host!()
        ),
        KindTag::AuthenticationFailure,
        false,
    ),
    (
        "cargo_registry_auth",
        concat!(
            r"failed to get successful HTTP response from `https?://",
            host!(),
            r"[^\n]*?got 40[13]"
        ),
        KindTag::AuthenticationFailure,
        false,
    ),
    (
        "cargo_certificate",
        concat!(r"(?s)https?://", host!(), r".*?SSL (?:peer )?certificate"),
        KindTag::CertificateFailure,
        false,
    ),
    (
        "cargo_timeout",
        concat!(r"(?s)https?://", host!(), r".*?\[28\] Timeout was reached"),
        KindTag::SourceTimedOut,
        true,
    ),
    (
        "cargo_fetch_failed",
        r"failed to fetch `(?P<url>[^`]+)`",
        KindTag::SourceUnreachable,
        true,
    ),
    (
        "cargo_git_revspec",
        r"revspec '(?P<name>[^']+)' not found",
        KindTag::GitReferenceNotFound,
        false,
    ),
    (
        "cargo_path_missing",
        r"failed to read `(?P<name>[^`]+)/Cargo\.toml`",
        KindTag::PathDependencyUnreachable,
        false,
    ),
    (
        "cargo_manifest_parse",
        r"failed to parse manifest at|TOML parse error",
        KindTag::FilesNotEvaluatable,
        false,
    ),
    (
        "cargo_conflict",
        r"failed to select a version for|no matching package named",
        KindTag::NotResolvable,
        false,
    ),
];

builtin_rules!(BUNDLER, BUNDLER_RULES, Some(BUNDLER_CONFLICT));
builtin_rules!(NPM, NPM_RULES, Some(NPM_CONFLICT));
builtin_rules!(CARGO, CARGO_RULES, None);
