//! Ecosystem adapters.
//!
//! The core never branches on package manager. It talks to one
//! [`Ecosystem`] value, chosen once at the boundary, that bundles:
//!
//! - a [`ProbeBuilder`] for the ecosystem's file grammar
//! - a [`ResolverInvoker`] running its resolution tool
//! - a [`ClassifierRuleSet`] mapping its failure messages onto [`ErrorKind`](crate::classify::ErrorKind)
//!
//! [`CommandEcosystem`] is the configuration-driven adapter: the YAML
//! manifest format from [`yaml`] plus any shell command that prints the
//! resolved set as a JSON object.

pub mod invoker;
pub mod scripted;
pub mod yaml;

pub use invoker::{ResolverInvoker, SandboxInvoker};
pub use scripted::ScriptedInvoker;
pub use yaml::{YamlManifestEditor, DEFAULT_LOCKFILE, DEFAULT_MANIFEST};

use crate::classify::{ClassifierRule, ClassifierRuleSet};
use crate::config::{EcosystemConfig, Settings};
use crate::error::{Result, UpliftError};
use crate::model::{Dependency, ProjectFileSet};
use crate::probe::{ManifestProbeBuilder, PatchPipeline, ProbeBuilder};
use crate::sandbox::{
    ChainedInjector, CredentialInjector, EnvCredentialInjector, NetrcCredentialInjector,
    NoCredentials, SandboxRunner, ToolCommand,
};
use crate::secrets::SecretEnvMatcher;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Package name to resolved version (or revision), as a tool reports it.
pub type ResolvedSet = BTreeMap<String, String>;

/// Capability interface of one package ecosystem.
pub trait Ecosystem: Send + Sync {
    /// Package manager tag, e.g. `bundler`.
    fn name(&self) -> &str;

    fn probe_builder(&self) -> &dyn ProbeBuilder;

    fn invoker(&self) -> &dyn ResolverInvoker;

    fn rules(&self) -> &ClassifierRuleSet;

    /// Read `name` from the project's files.
    fn dependency(&self, files: &ProjectFileSet, name: &str) -> Result<Option<Dependency>>;

    /// Extract the resolved set from tool output.
    fn parse_resolved(&self, output: &str) -> Option<ResolvedSet> {
        parse_resolved_set(output)
    }

    /// Secret values the adapter itself passes to the tool.
    fn secret_values(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Parse a JSON object of `name: version` pairs.
///
/// The whole output is tried first; failing that, the last line opening an
/// object and everything after it, so tools that log before printing the
/// result still parse. String and number values are kept.
///
/// ```
/// use uplift::ecosystem::parse_resolved_set;
///
/// let set = parse_resolved_set("fetching...\n{\"rack\": \"1.13.0\"}\n").unwrap();
/// assert_eq!(set["rack"], "1.13.0");
/// ```
pub fn parse_resolved_set(output: &str) -> Option<ResolvedSet> {
    let text = output.trim();
    if let Some(set) = parse_object(text) {
        return Some(set);
    }
    let start = text
        .match_indices('\n')
        .map(|(i, _)| i + 1)
        .filter(|i| text[*i..].trim_start().starts_with('{'))
        .last()?;
    parse_object(&text[start..])
}

fn parse_object(text: &str) -> Option<ResolvedSet> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text).ok()?;
    Some(
        map.into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::String(s) => Some((name, s)),
                serde_json::Value::Number(n) => Some((name, n.to_string())),
                _ => None,
            })
            .collect(),
    )
}

/// A YAML-manifest ecosystem driven by an external command.
pub struct CommandEcosystem {
    name: String,
    editor: YamlManifestEditor,
    builder: ManifestProbeBuilder<YamlManifestEditor>,
    invoker: Box<dyn ResolverInvoker>,
    rules: ClassifierRuleSet,
    secrets: Vec<String>,
}

impl CommandEcosystem {
    pub fn new(
        name: impl Into<String>,
        editor: YamlManifestEditor,
        invoker: impl ResolverInvoker + 'static,
        rules: ClassifierRuleSet,
    ) -> Self {
        Self {
            name: name.into(),
            builder: ManifestProbeBuilder::new(editor.clone()),
            editor,
            invoker: Box::new(invoker),
            rules,
            secrets: Vec::new(),
        }
    }

    /// Replace the quirk patch pipeline.
    pub fn with_patches(mut self, patches: PatchPipeline) -> Self {
        self.builder = ManifestProbeBuilder::new(self.editor.clone()).with_patches(patches);
        self
    }

    /// Build the adapter described by an `ecosystems.<name>` config entry.
    pub fn from_config(name: &str, config: &EcosystemConfig, settings: &Settings) -> Result<Self> {
        let rules = rule_set(config)?;

        let patches = config
            .disabled_patches
            .iter()
            .fold(PatchPipeline::builtin(), |p, patch| p.disable(patch.clone()));

        let mut command = ToolCommand::shell(config.command.clone());
        for (key, value) in &config.env {
            command = command.env(key.clone(), value.clone());
        }

        let runner = SandboxRunner::new(settings.timeout()).with_injector(injector(config));
        let editor = YamlManifestEditor::new(config.manifest.clone(), config.lockfile.clone());

        debug!(
            "Ecosystem '{}': {} rule(s), command '{}'",
            name,
            rules.rules().len(),
            command
        );

        let mut ecosystem = Self::new(name, editor, SandboxInvoker::new(runner, command), rules)
            .with_patches(patches);
        ecosystem.secrets = SecretEnvMatcher::with_builtins()
            .secret_values(&config.env)
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(ecosystem)
    }

    pub fn editor(&self) -> &YamlManifestEditor {
        &self.editor
    }
}

/// Custom rules first, then the built-in set.
fn rule_set(config: &EcosystemConfig) -> Result<ClassifierRuleSet> {
    let mut rules = ClassifierRuleSet::new();
    for rule in &config.rules {
        rules = rules.with_rule(
            ClassifierRule::new(rule.name.clone(), &rule.pattern, rule.kind)?
                .retryable(rule.retryable),
        );
    }

    if let Some(builtin) = &config.builtin_rules {
        let table = ClassifierRuleSet::builtin(builtin).ok_or_else(|| {
            UpliftError::ConfigValidationError {
                message: format!("unknown built-in rules '{}'", builtin),
            }
        })?;
        rules = rules.extended(&table);
    }

    if let Some(pattern) = &config.embedded_result {
        rules = rules.with_embedded_result(pattern)?;
    }
    if let Some(pattern) = &config.conflict_pattern {
        rules = rules.with_conflict_pattern(pattern)?;
    }
    Ok(rules.with_retry_timeouts(config.retry_timeouts))
}

fn injector(config: &EcosystemConfig) -> Arc<dyn CredentialInjector> {
    let mut injectors: Vec<Box<dyn CredentialInjector>> = Vec::new();
    if let Some(template) = &config.credential_env {
        injectors.push(Box::new(EnvCredentialInjector::new(template.clone())));
    }
    if config.netrc {
        injectors.push(Box::new(NetrcCredentialInjector));
    }
    match injectors.len() {
        0 => Arc::new(NoCredentials),
        _ => Arc::new(ChainedInjector::new(injectors)),
    }
}

impl Ecosystem for CommandEcosystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe_builder(&self) -> &dyn ProbeBuilder {
        &self.builder
    }

    fn invoker(&self) -> &dyn ResolverInvoker {
        self.invoker.as_ref()
    }

    fn rules(&self) -> &ClassifierRuleSet {
        &self.rules
    }

    fn dependency(&self, files: &ProjectFileSet, name: &str) -> Result<Option<Dependency>> {
        self.editor.dependency(files, &self.name, name)
    }

    fn secret_values(&self) -> Vec<String> {
        self.secrets.clone()
    }
}
