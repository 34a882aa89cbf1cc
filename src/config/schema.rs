//! Configuration schema definitions for uplift.
//!
//! This module contains the struct definitions that map to the YAML
//! configuration file format.

use crate::classify::KindTag;
use crate::ecosystem::yaml::{DEFAULT_LOCKFILE, DEFAULT_MANIFEST};
use crate::model::Credential;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration structure for `.uplift/config.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpliftConfig {
    /// Global settings
    pub settings: Settings,

    /// Ecosystem adapters by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ecosystems: BTreeMap<String, EcosystemConfig>,

    /// Versions never to move to, per dependency
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<IgnoreConfig>,

    /// Credentials forwarded to resolution tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialConfig>,
}

impl UpliftConfig {
    /// Ignore constraints configured for `dependency`.
    pub fn ignored_versions(&self, dependency: &str) -> Vec<String> {
        self.ignore
            .iter()
            .filter(|i| i.dependency == dependency)
            .flat_map(|i| i.versions.iter().cloned())
            .collect()
    }
}

/// Global settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sandbox wall clock per tool run, in seconds
    pub timeout_secs: u64,

    /// Additional attempts for retryable failures
    pub retry_budget: u32,

    /// Jittered sleep between retries
    pub backoff: BackoffConfig,

    /// Replacement for secret values in diagnostics
    pub secret_mask: String,

    /// Ecosystem used when none is named on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ecosystem: Option<String>,
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            retry_budget: 2,
            backoff: BackoffConfig::default(),
            secret_mask: "[REDACTED]".to_string(),
            default_ecosystem: None,
        }
    }
}

/// Retry backoff interval in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 5000,
        }
    }
}

/// One ecosystem adapter: a resolution command plus its file layout and rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcosystemConfig {
    /// Shell command run inside the sandbox
    pub command: String,

    /// Manifest file name
    pub manifest: String,

    /// Lock file name (`null` for none)
    pub lockfile: Option<String>,

    /// Built-in classifier rules to include: bundler, npm, cargo
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin_rules: Option<String>,

    /// Extra classifier rules, tried before the built-in ones
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleConfig>,

    /// Pattern locating a result printed alongside a failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_result: Option<String>,

    /// Pattern extracting conflict records from a failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_pattern: Option<String>,

    /// Quirk patches to switch off
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disabled_patches: Vec<String>,

    /// Environment variable template for credentials, e.g. `BUNDLE_{HOST}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_env: Option<String>,

    /// Write a sandbox-local `.netrc`
    #[serde(skip_serializing_if = "is_false")]
    pub netrc: bool,

    /// Retry runs that hit the sandbox timeout
    #[serde(skip_serializing_if = "is_false")]
    pub retry_timeouts: bool,

    /// Extra environment for the command
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Default for EcosystemConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            manifest: DEFAULT_MANIFEST.to_string(),
            lockfile: Some(DEFAULT_LOCKFILE.to_string()),
            builtin_rules: None,
            rules: Vec::new(),
            embedded_result: None,
            conflict_pattern: None,
            disabled_patches: Vec::new(),
            credential_env: None,
            netrc: false,
            retry_timeouts: false,
            env: BTreeMap::new(),
        }
    }
}

/// A custom classifier rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub pattern: String,
    pub kind: KindTag,
    #[serde(default, skip_serializing_if = "is_false")]
    pub retryable: bool,
}

/// Versions of one dependency never to move to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    pub dependency: String,
    /// Constraints, e.g. `>= 3.0`
    pub versions: Vec<String>,
}

/// A credential whose secret values come from environment variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(rename = "type")]
    pub credential_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Secret key to environment variable name
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CredentialConfig {
    /// Build the credential, reading secrets through `lookup`.
    ///
    /// Keys whose variable is unset are left out.
    pub fn resolve(&self, lookup: impl Fn(&str) -> Option<String>) -> Credential {
        Credential {
            credential_type: self.credential_type.clone(),
            host: self.host.clone(),
            secret: self
                .env
                .iter()
                .filter_map(|(key, var)| Some((key.clone(), lookup(var)?)))
                .collect(),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}
