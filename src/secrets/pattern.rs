//! Secret environment variable detection.
//!
//! Environment handed to a sandbox may carry secrets that did not come from a
//! [`Credential`](crate::model::Credential) record (a token the tool config
//! needs). Values of variables whose *names* look secret are redacted too.

use regex::Regex;

/// Built-in patterns for secret variable names.
///
/// Each tuple contains (name, regex_pattern).
pub const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("api_key", r"(?i)^.*_?(API_?KEY|APIKEY)$"),
    ("secret", r"(?i)^.*_?(SECRET|SECRET_KEY)$"),
    ("token", r"(?i)^.*_?(TOKEN|ACCESS_TOKEN|AUTH_TOKEN)$"),
    ("password", r"(?i)^.*_?(PASSWORD|PASSWD|PWD)$"),
    ("credential", r"(?i)^.*_?CREDENTIALS?$"),
    ("registry_auth", r"(?i)^.*_?(AUTH|NPM_AUTH|BUNDLE_.*__.*)$"),
];

/// Matches environment variable names against secret patterns.
///
/// # Example
///
/// ```
/// use uplift::secrets::SecretEnvMatcher;
///
/// let matcher = SecretEnvMatcher::with_builtins();
/// assert!(matcher.is_secret("NPM_TOKEN"));
/// assert!(matcher.is_secret("BUNDLE_INTERNAL__EXAMPLE__ORG"));
/// assert!(!matcher.is_secret("PATH"));
/// ```
pub struct SecretEnvMatcher {
    patterns: Vec<Regex>,
}

impl SecretEnvMatcher {
    /// Create a matcher with built-in patterns.
    pub fn with_builtins() -> Self {
        let patterns = BUILTIN_PATTERNS
            .iter()
            .filter_map(|(_, pattern)| Regex::new(pattern).ok())
            .collect();
        Self { patterns }
    }

    /// Check if an environment variable name looks secret.
    pub fn is_secret(&self, env_name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(env_name))
    }

    /// Values of the secret-looking entries of `env`.
    pub fn secret_values<'a>(
        &self,
        env: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Vec<&'a str> {
        env.into_iter()
            .filter(|(name, _)| self.is_secret(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

impl Default for SecretEnvMatcher {
    fn default() -> Self {
        Self::with_builtins()
    }
}
