//! Credentials forwarded into sandboxes.
//!
//! The core never stores credentials and never looks inside the secret
//! material: it filters records by type and host and hands them to a
//! [`CredentialInjector`](crate::sandbox::CredentialInjector).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One opaque credential record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Record type, e.g. `vcs_source` or `private_registry`.
    #[serde(rename = "type")]
    pub credential_type: String,
    /// Host the credential applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Secret fields (`token`, `username`, `password`, ...).
    #[serde(default)]
    pub secret: BTreeMap<String, String>,
}

impl Credential {
    pub fn new(credential_type: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            credential_type: credential_type.into(),
            host: Some(host.into()),
            secret: BTreeMap::new(),
        }
    }

    /// Add a secret field.
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secret.insert(key.into(), value.into());
        self
    }

    /// Whether this record applies to `host` (exact or subdomain match).
    pub fn matches_host(&self, host: &str) -> bool {
        match &self.host {
            Some(h) => host == h || host.ends_with(&format!(".{}", h)),
            None => false,
        }
    }
}

// Secret values must never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("credential_type", &self.credential_type)
            .field("host", &self.host)
            .field("secret", &self.secret.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An ordered, read-only, cheaply cloned list of credentials.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    inner: Arc<Vec<Credential>>,
}

impl Credentials {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            inner: Arc::new(credentials),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.inner.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Records of one type, in order.
    pub fn of_type<'a>(&'a self, credential_type: &'a str) -> impl Iterator<Item = &'a Credential> {
        self.inner
            .iter()
            .filter(move |c| c.credential_type == credential_type)
    }

    /// First record applying to `host`.
    pub fn for_host(&self, host: &str) -> Option<&Credential> {
        self.inner.iter().find(|c| c.matches_host(host))
    }

    /// Every secret value, for output masking.
    pub fn secret_values(&self) -> Vec<&str> {
        self.inner
            .iter()
            .flat_map(|c| c.secret.values())
            .map(String::as_str)
            .collect()
    }
}

impl From<Vec<Credential>> for Credentials {
    fn from(credentials: Vec<Credential>) -> Self {
        Self::new(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new(vec![
            Credential::new("private_registry", "internal.example.org")
                .with_secret("token", "s3cr3t"),
            Credential::new("vcs_source", "github.com").with_secret("password", "hunter2"),
        ])
    }

    #[test]
    fn filters_by_type() {
        let c = creds();
        let registries: Vec<_> = c.of_type("private_registry").collect();
        assert_eq!(registries.len(), 1);
        assert_eq!(registries[0].host.as_deref(), Some("internal.example.org"));
    }

    #[test]
    fn matches_subdomains() {
        let c = creds();
        assert!(c.for_host("api.github.com").is_some());
        assert!(c.for_host("notgithub.com").is_none());
    }

    #[test]
    fn debug_hides_secret_values() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("token"));
    }

    #[test]
    fn collects_secret_values() {
        let c = creds();
        let mut values = c.secret_values();
        values.sort();
        assert_eq!(values, vec!["hunter2", "s3cr3t"]);
    }

    #[test]
    fn deserializes_type_field() {
        let c: Credential = serde_yaml::from_str(
            "type: private_registry\nhost: internal.example.org\nsecret:\n  token: abc\n",
        )
        .unwrap();
        assert_eq!(c.credential_type, "private_registry");
        assert_eq!(c.secret.get("token").map(String::as_str), Some("abc"));
    }
}
