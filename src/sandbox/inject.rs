//! Credential injection into a sandbox.
//!
//! Each resolution tool has its own way of reading credentials: environment
//! variables (`BUNDLE_<HOST>`, `NPM_TOKEN`), or config files under `$HOME`
//! (`.netrc`, `.npmrc`). An injector turns credential records into variables
//! and files that exist only for one sandboxed process.

use crate::error::Result;
use crate::model::{Credential, Credentials, ProjectFile};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment and files to add to a sandbox.
#[derive(Debug, Clone, Default)]
pub struct SandboxEnv {
    pub env: BTreeMap<String, String>,
    /// Extra files, relative to the sandbox root.
    pub files: Vec<ProjectFile>,
}

/// Maps credentials onto a tool's own authentication mechanism.
pub trait CredentialInjector: Send + Sync {
    /// Produce what the tool needs to see `credentials` inside `sandbox`.
    fn inject(&self, sandbox: &Path, credentials: &Credentials) -> Result<SandboxEnv>;
}

/// Injects nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialInjector for NoCredentials {
    fn inject(&self, _sandbox: &Path, _credentials: &Credentials) -> Result<SandboxEnv> {
        Ok(SandboxEnv::default())
    }
}

/// Exposes each credential as an environment variable.
///
/// The name template may use `{TYPE}`, `{HOST}` and `{KEY}`. Hosts are
/// upper-cased with `.` written as `__` and `-` as `___`, the convention
/// Bundler uses for per-host config. Without `{KEY}` the value is the
/// `token` field, or `username:password`.
///
/// # Example
///
/// ```
/// use uplift::model::{Credential, Credentials};
/// use uplift::sandbox::{CredentialInjector, EnvCredentialInjector};
///
/// let creds = Credentials::new(vec![
///     Credential::new("private_registry", "gems.example.org").with_secret("token", "abc"),
/// ]);
/// let env = EnvCredentialInjector::new("BUNDLE_{HOST}")
///     .inject(std::path::Path::new("/tmp"), &creds)
///     .unwrap();
/// assert_eq!(env.env["BUNDLE_GEMS__EXAMPLE__ORG"], "abc");
/// ```
#[derive(Debug, Clone)]
pub struct EnvCredentialInjector {
    template: String,
    types: Vec<String>,
}

impl EnvCredentialInjector {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            types: Vec::new(),
        }
    }

    /// Only forward credentials of these types.
    pub fn for_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    fn wanted(&self, credential: &Credential) -> bool {
        self.types.is_empty() || self.types.contains(&credential.credential_type)
    }

    fn name(&self, credential: &Credential, host: &str, key: Option<&str>) -> String {
        let host = host
            .to_uppercase()
            .replace('-', "___")
            .replace('.', "__");
        let mut name = self
            .template
            .replace("{TYPE}", &credential.credential_type.to_uppercase())
            .replace("{HOST}", &host);
        if let Some(key) = key {
            name = name.replace("{KEY}", &key.to_uppercase());
        }
        name
    }
}

impl Default for EnvCredentialInjector {
    fn default() -> Self {
        Self::new("UPLIFT_{TYPE}_{HOST}_{KEY}")
    }
}

impl CredentialInjector for EnvCredentialInjector {
    fn inject(&self, _sandbox: &Path, credentials: &Credentials) -> Result<SandboxEnv> {
        let mut out = SandboxEnv::default();
        for credential in credentials.iter().filter(|c| self.wanted(c)) {
            let Some(host) = credential.host.as_deref() else {
                continue;
            };
            if self.template.contains("{KEY}") {
                for (key, value) in &credential.secret {
                    out.env
                        .insert(self.name(credential, host, Some(key)), value.clone());
                }
            } else if let Some(value) = combined_secret(credential) {
                out.env.insert(self.name(credential, host, None), value);
            }
        }
        Ok(out)
    }
}

fn combined_secret(credential: &Credential) -> Option<String> {
    if let Some(token) = credential.secret.get("token") {
        return Some(token.clone());
    }
    match (
        credential.secret.get("username"),
        credential.secret.get("password"),
    ) {
        (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
        _ => None,
    }
}

/// Writes a sandbox-local `.netrc` and points `HOME` at the sandbox.
///
/// Git, curl and most HTTP clients pick credentials up from `$HOME/.netrc`,
/// so this covers VCS sources without touching the real home directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetrcCredentialInjector;

impl CredentialInjector for NetrcCredentialInjector {
    fn inject(&self, sandbox: &Path, credentials: &Credentials) -> Result<SandboxEnv> {
        let mut netrc = String::new();
        for credential in credentials.iter() {
            let Some(host) = credential.host.as_deref() else {
                continue;
            };
            let (login, password) = match (
                credential.secret.get("username"),
                credential.secret.get("password"),
                credential.secret.get("token"),
            ) {
                (Some(user), Some(pass), _) => (user.clone(), pass.clone()),
                (_, _, Some(token)) => ("x-access-token".to_string(), token.clone()),
                _ => continue,
            };
            netrc.push_str(&format!(
                "machine {}\n  login {}\n  password {}\n",
                host, login, password
            ));
        }

        let mut out = SandboxEnv::default();
        if netrc.is_empty() {
            return Ok(out);
        }
        out.files.push(ProjectFile::new(".netrc", netrc));
        out.env
            .insert("HOME".to_string(), sandbox.to_string_lossy().to_string());
        out.env.insert(
            "NETRC".to_string(),
            sandbox.join(".netrc").to_string_lossy().to_string(),
        );
        Ok(out)
    }
}

/// Runs several injectors and merges their output, later ones winning.
pub struct ChainedInjector {
    injectors: Vec<Box<dyn CredentialInjector>>,
}

impl ChainedInjector {
    pub fn new(injectors: Vec<Box<dyn CredentialInjector>>) -> Self {
        Self { injectors }
    }
}

impl CredentialInjector for ChainedInjector {
    fn inject(&self, sandbox: &Path, credentials: &Credentials) -> Result<SandboxEnv> {
        let mut merged = SandboxEnv::default();
        for injector in &self.injectors {
            let part = injector.inject(sandbox, credentials)?;
            merged.env.extend(part.env);
            merged.files.extend(part.files);
        }
        Ok(merged)
    }
}
