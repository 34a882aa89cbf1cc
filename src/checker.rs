//! The public checking surface.
//!
//! An [`UpdateChecker`] answers questions about one project's dependencies:
//! the newest version each can move to, the requirement text that version
//! needs, what stands in the way of a specific target, and what else must
//! move to force one.
//!
//! Each dependency gets its own [`VersionResolver`], so batch checks run in
//! parallel without sharing any mutable state.

use crate::config::UpliftConfig;
use crate::ecosystem::{CommandEcosystem, Ecosystem};
use crate::error::{Result, UpliftError};
use crate::force::ForceUpdater;
use crate::model::{Credentials, Dependency, ProjectFileSet, Requirement, UpdatePolicy, UpdateStrategy};
use crate::probe::ProbeRequest;
use crate::resolver::{ResolutionOutcome, RetryPolicy, VersionResolver};
use crate::sandbox::CancellationToken;
use crate::updater::update_requirements;
use crate::version::{Constraint, ResolvedVersion, Version};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// A dependency whose requirement rules out the target version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// The package declaring the requirement.
    pub name: String,
    /// Its resolved version.
    pub version: String,
    /// The requirement the target violates.
    pub violated_constraint: String,
}

/// Checks one project's dependencies for updates.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use uplift::checker::UpdateChecker;
/// use uplift::classify::ClassifierRuleSet;
/// use uplift::ecosystem::{CommandEcosystem, ScriptedInvoker, YamlManifestEditor};
/// use uplift::model::{Credentials, Dependency, ProjectFile, ProjectFileSet, Requirement, UpdatePolicy};
///
/// let tool = ScriptedInvoker::new();
/// tool.push_success(r#"{"rack": "1.13.0"}"#);
/// let ecosystem = CommandEcosystem::new(
///     "local",
///     YamlManifestEditor::default(),
///     tool.clone(),
///     ClassifierRuleSet::builtin("bundler").unwrap(),
/// );
/// let files = ProjectFileSet::new(vec![
///     ProjectFile::new("deps.yml", "dependencies:\n  rack: \"~> 1.4.0\"\n"),
///     ProjectFile::new("deps.lock", "rack: \"1.4.0\"\n"),
/// ]);
///
/// let mut checker = UpdateChecker::new(Arc::new(ecosystem), files, Credentials::default());
/// let rack = Dependency::new("rack", "local")
///     .with_version("1.4.0")
///     .with_requirement(Requirement::new("deps.yml", "~> 1.4.0"));
/// assert!(checker.can_update(&rack, UpdatePolicy::UnlockOwn).unwrap());
/// ```
pub struct UpdateChecker {
    ecosystem: Arc<dyn Ecosystem>,
    files: ProjectFileSet,
    credentials: Arc<Credentials>,
    retry: RetryPolicy,
    secret_mask: String,
    cancel: CancellationToken,
    ignored: BTreeMap<String, Vec<Constraint>>,
    resolvers: HashMap<String, VersionResolver>,
}

impl UpdateChecker {
    pub fn new(ecosystem: Arc<dyn Ecosystem>, files: ProjectFileSet, credentials: Credentials) -> Self {
        Self {
            ecosystem,
            files,
            credentials: Arc::new(credentials),
            retry: RetryPolicy::default(),
            secret_mask: "[REDACTED]".to_string(),
            cancel: CancellationToken::new(),
            ignored: BTreeMap::new(),
            resolvers: HashMap::new(),
        }
    }

    /// Build a checker for the project at `root` from its configuration.
    ///
    /// `ecosystem` picks an `ecosystems` entry; without it the configured
    /// default is used, or the only entry when there is exactly one.
    pub fn from_config(config: &UpliftConfig, ecosystem: Option<&str>, root: &Path) -> Result<Self> {
        let name = select_ecosystem(config, ecosystem)?;
        let eco_config = config
            .ecosystems
            .get(&name)
            .ok_or_else(|| UpliftError::UnknownEcosystem { name: name.clone() })?;

        let mut names = vec![eco_config.manifest.as_str()];
        names.extend(eco_config.lockfile.as_deref());
        let files = ProjectFileSet::load(root, &names)?;
        debug!("Loaded {} project file(s) from {}", files.len(), root.display());

        let credentials = Credentials::new(
            config
                .credentials
                .iter()
                .map(|c| c.resolve(|var| std::env::var(var).ok()))
                .collect(),
        );

        let ecosystem = CommandEcosystem::from_config(&name, eco_config, &config.settings)?;
        let mut checker = Self::new(Arc::new(ecosystem), files, credentials)
            .with_retry_policy(RetryPolicy::from_settings(&config.settings))
            .with_secret_mask(&config.settings.secret_mask);
        for ignore in &config.ignore {
            checker = checker.with_ignored_versions(&ignore.dependency, &ignore.versions)?;
        }
        Ok(checker)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_secret_mask(mut self, mask: &str) -> Self {
        self.secret_mask = mask.to_string();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Never move `dependency` to a version matching any of `constraints`.
    pub fn with_ignored_versions(
        mut self,
        dependency: &str,
        constraints: &[impl AsRef<str>],
    ) -> Result<Self> {
        let parsed = constraints
            .iter()
            .map(|c| Constraint::parse(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.ignored
            .entry(dependency.to_string())
            .or_default()
            .extend(parsed);
        Ok(self)
    }

    pub fn files(&self) -> &ProjectFileSet {
        &self.files
    }

    pub fn ecosystem(&self) -> &dyn Ecosystem {
        self.ecosystem.as_ref()
    }

    /// Read a dependency from the project files.
    pub fn dependency(&self, name: &str) -> Result<Option<Dependency>> {
        self.ecosystem.dependency(&self.files, name)
    }

    /// Total tool invocations across every dependency checked so far.
    pub fn invocations(&self) -> usize {
        self.resolvers.values().map(VersionResolver::invocations).sum()
    }

    /// The newest version `dependency` can move to under `policy`.
    pub fn latest_resolvable_version(
        &mut self,
        dependency: &Dependency,
        policy: UpdatePolicy,
    ) -> Result<ResolutionOutcome> {
        let ignored = self.ignored_for(dependency);
        let resolver = self.resolver(dependency)?;
        latest(resolver, dependency, policy, &ignored)
    }

    /// Resolve many dependencies at once, one thread per dependency.
    ///
    /// Results come back in input order.
    pub fn latest_resolvable_versions(
        &mut self,
        dependencies: &[Dependency],
        policy: UpdatePolicy,
    ) -> Vec<Result<ResolutionOutcome>> {
        let mut jobs = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let job = self
                .take_resolver(dependency)
                .map(|resolver| (resolver, self.ignored_for(dependency)));
            jobs.push((dependency, job));
        }

        let finished: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|(dependency, job)| {
                    scope.spawn(move || match job {
                        Ok((mut resolver, ignored)) => {
                            let result = latest(&mut resolver, dependency, policy, &ignored);
                            (dependency, Some(resolver), result)
                        }
                        Err(e) => (dependency, None, Err(e)),
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().map_err(|_| {
                        UpliftError::Other(anyhow::anyhow!("resolution thread panicked"))
                    })
                })
                .collect()
        });

        finished
            .into_iter()
            .map(|joined| {
                let (dependency, resolver, result) = joined?;
                if let Some(resolver) = resolver {
                    self.resolvers.insert(dependency.name().to_string(), resolver);
                }
                result
            })
            .collect()
    }

    /// Requirement text admitting `resolved`. Pure; runs nothing.
    pub fn updated_requirements(
        &self,
        dependency: &Dependency,
        resolved: &ResolvedVersion,
        strategy: UpdateStrategy,
    ) -> Result<Vec<Requirement>> {
        update_requirements(dependency.requirements(), resolved, strategy, None)
    }

    /// The "after" value of `dependency` at its latest resolvable version.
    pub fn updated_dependency(
        &mut self,
        dependency: &Dependency,
        policy: UpdatePolicy,
        strategy: UpdateStrategy,
    ) -> Result<ResolutionOutcome<Dependency>> {
        let resolved = match self.latest_resolvable_version(dependency, policy)? {
            ResolutionOutcome::Resolved(version) => version,
            ResolutionOutcome::Unresolved => return Ok(ResolutionOutcome::Unresolved),
            ResolutionOutcome::Failed(failure) => return Ok(ResolutionOutcome::Failed(failure)),
        };
        let requirements = self.updated_requirements(dependency, &resolved, strategy)?;
        Ok(ResolutionOutcome::Resolved(
            dependency.updated(resolved.to_string(), requirements),
        ))
    }

    /// Whether `dependency` has anything newer to move to.
    ///
    /// A classified failure is returned as [`UpliftError::Resolution`].
    pub fn can_update(&mut self, dependency: &Dependency, policy: UpdatePolicy) -> Result<bool> {
        let latest = self
            .latest_resolvable_version(dependency, policy)?
            .into_result(dependency.name())?;
        let Some(latest) = latest else {
            return Ok(false);
        };
        Ok(match (&latest, dependency.resolved_version()) {
            (ResolvedVersion::Version(next), Some(ResolvedVersion::Version(current))) => {
                *next > current
            }
            (ResolvedVersion::Revision(next), _) => {
                let current = dependency
                    .git_source()
                    .and_then(|g| g.revision.clone())
                    .or_else(|| dependency.version().map(str::to_string));
                current.as_deref() != Some(next.as_str())
            }
            (ResolvedVersion::Version(_), _) => true,
        })
    }

    /// Dependencies whose requirements rule out `target`.
    ///
    /// Asks the tool for `target` with every lock entry kept and reads the
    /// conflicts out of the failure. Empty when the target resolves.
    pub fn conflicting_dependencies(
        &mut self,
        dependency: &Dependency,
        target: &Version,
    ) -> Result<Vec<Conflict>> {
        let request = ProbeRequest::new(dependency.clone(), UpdatePolicy::NoUnlock)
            .with_target(target.clone());
        let outcome = self.resolver(dependency)?.resolve_set(&request)?;

        let failure = match outcome {
            // The project is broken already; there is nothing to attribute.
            ResolutionOutcome::Failed(failure) if failure.is_preexisting() => {
                return Err(UpliftError::Resolution {
                    dependency: dependency.name().to_string(),
                    kind: failure.kind,
                    diagnostic: failure.diagnostic,
                });
            }
            ResolutionOutcome::Failed(failure) => failure,
            _ => return Ok(Vec::new()),
        };

        let Some(pattern) = self.ecosystem.rules().conflict_pattern() else {
            debug!("No conflict pattern for '{}'", self.ecosystem.name());
            return Ok(Vec::new());
        };

        let mut conflicts: Vec<Conflict> = Vec::new();
        for caps in pattern.captures_iter(&failure.diagnostic) {
            let field = |group: &str| {
                caps.name(group)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default()
            };
            let conflict = Conflict {
                name: field("name"),
                version: field("version"),
                violated_constraint: field("constraint"),
            };
            if !conflict.name.is_empty() && !conflicts.contains(&conflict) {
                conflicts.push(conflict);
            }
        }
        info!(
            "{} conflict(s) block '{}' at {}",
            conflicts.len(),
            dependency.name(),
            target
        );
        Ok(conflicts)
    }

    /// Every dependency that must change to move `dependency` to `target`.
    pub fn force(
        &mut self,
        dependency: &Dependency,
        target: &Version,
        strategy: UpdateStrategy,
    ) -> Result<ResolutionOutcome<Vec<Dependency>>> {
        let resolver = self.resolver(dependency)?;
        ForceUpdater::new(resolver)
            .with_strategy(strategy)
            .force(dependency, target)
    }

    fn ignored_for(&self, dependency: &Dependency) -> Vec<Constraint> {
        self.ignored
            .get(dependency.name())
            .cloned()
            .unwrap_or_default()
    }

    fn resolver(&mut self, dependency: &Dependency) -> Result<&mut VersionResolver> {
        let resolver = self.take_resolver(dependency)?;
        Ok(self
            .resolvers
            .entry(dependency.name().to_string())
            .or_insert(resolver))
    }

    /// The dependency's resolver, removed from the cache, or a new one.
    fn take_resolver(&mut self, dependency: &Dependency) -> Result<VersionResolver> {
        if let Some(resolver) = self.resolvers.remove(dependency.name()) {
            return Ok(resolver);
        }
        self.files.validate_dependency(dependency)?;
        Ok(VersionResolver::new(
            Arc::clone(&self.ecosystem),
            self.files.clone(),
            Arc::clone(&self.credentials),
        )
        .with_retry_policy(self.retry)
        .with_secret_mask(&self.secret_mask)
        .with_cancellation(self.cancel.clone()))
    }
}

/// Resolve with ignored versions kept out of the answer.
fn latest(
    resolver: &mut VersionResolver,
    dependency: &Dependency,
    policy: UpdatePolicy,
    ignored: &[Constraint],
) -> Result<ResolutionOutcome> {
    let exclusions = ignored
        .iter()
        .filter_map(|c| match c.clauses() {
            [clause] => clause.negated(),
            _ => None,
        })
        .collect();
    let request = ProbeRequest::new(dependency.clone(), policy).with_exclusions(exclusions);

    Ok(resolver.resolve(&request)?.and_then(|resolved| {
        let hit = resolved
            .as_version()
            .and_then(|v| ignored.iter().find(|c| c.matches(v)));
        match hit {
            Some(constraint) => {
                info!(
                    "'{}' resolved to ignored version {} ({}); leaving unchanged",
                    dependency.name(),
                    resolved,
                    constraint
                );
                ResolutionOutcome::Unresolved
            }
            None => ResolutionOutcome::Resolved(resolved),
        }
    }))
}

fn select_ecosystem(config: &UpliftConfig, requested: Option<&str>) -> Result<String> {
    if let Some(name) = requested.or(config.settings.default_ecosystem.as_deref()) {
        return Ok(name.to_string());
    }
    let mut names = config.ecosystems.keys();
    match (names.next(), names.next()) {
        (Some(only), None) => Ok(only.clone()),
        (None, _) => Err(UpliftError::ConfigValidationError {
            message: "no ecosystems configured".to_string(),
        }),
        _ => Err(UpliftError::ConfigValidationError {
            message: "several ecosystems configured; choose one with --ecosystem".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ClassifierRuleSet, ErrorKind};
    use crate::ecosystem::{ScriptedInvoker, YamlManifestEditor};
    use crate::model::ProjectFile;
    use std::time::Duration;

    const MANIFEST: &str = "dependencies:\n  rack: \"~> 1.4.0\"\n  sinatra: \">= 2.0\"\n";
    const LOCK: &str = "rack: \"1.4.0\"\nsinatra: \"2.0.1\"\nrack-protection: \"2.0.1\"\n";

    fn checker(tool: &ScriptedInvoker) -> UpdateChecker {
        let ecosystem = CommandEcosystem::new(
            "local",
            YamlManifestEditor::default(),
            tool.clone(),
            ClassifierRuleSet::builtin("bundler").unwrap(),
        );
        let files = ProjectFileSet::new(vec![
            ProjectFile::new("deps.yml", MANIFEST),
            ProjectFile::new("deps.lock", LOCK),
        ]);
        UpdateChecker::new(Arc::new(ecosystem), files, Credentials::default())
            .with_retry_policy(RetryPolicy::new(2).with_backoff(Duration::ZERO, Duration::ZERO))
    }

    fn rack() -> Dependency {
        Dependency::new("rack", "local")
            .with_version("1.4.0")
            .with_requirement(Requirement::new("deps.yml", "~> 1.4.0"))
    }

    #[test]
    fn pessimistic_requirement_follows_latest_version() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "1.13.0"}"#);
        let mut checker = checker(&tool);

        let latest = checker
            .latest_resolvable_version(&rack(), UpdatePolicy::UnlockOwn)
            .unwrap();
        let version = latest.resolved().unwrap();
        let requirements = checker
            .updated_requirements(&rack(), version, UpdateStrategy::BumpVersions)
            .unwrap();
        assert_eq!(requirements[0].requirement.as_deref(), Some("~> 1.13.0"));
    }

    #[test]
    fn updated_dependency_remembers_previous_state() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "1.13.0"}"#);
        let mut checker = checker(&tool);
        let outcome = checker
            .updated_dependency(&rack(), UpdatePolicy::UnlockOwn, UpdateStrategy::BumpVersions)
            .unwrap();
        let updated = outcome.resolved().unwrap();
        assert_eq!(updated.version(), Some("1.13.0"));
        assert_eq!(updated.previous_version(), Some("1.4.0"));
        assert_eq!(
            updated.previous_requirements().unwrap()[0].requirement.as_deref(),
            Some("~> 1.4.0")
        );
    }

    #[test]
    fn resolver_is_reused_per_dependency() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "1.13.0"}"#);
        let mut checker = checker(&tool);
        checker.can_update(&rack(), UpdatePolicy::UnlockOwn).unwrap();
        checker
            .latest_resolvable_version(&rack(), UpdatePolicy::UnlockOwn)
            .unwrap();
        assert_eq!(tool.calls(), 1);
        assert_eq!(checker.invocations(), 1);
    }

    #[test]
    fn can_update_compares_versions() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "1.4.0"}"#);
        let mut checker = checker(&tool);
        assert!(!checker.can_update(&rack(), UpdatePolicy::UnlockOwn).unwrap());
    }

    #[test]
    fn can_update_surfaces_failures() {
        let tool = ScriptedInvoker::new();
        tool.push_failure("Authentication is required for internal.example.org.");
        let mut checker = checker(&tool);
        let err = checker.can_update(&rack(), UpdatePolicy::UnlockOwn).unwrap_err();
        assert_eq!(
            err.kind(),
            Some(&ErrorKind::AuthenticationFailure {
                source: "internal.example.org".into()
            })
        );
    }

    #[test]
    fn ignored_floor_becomes_probe_exclusion() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "2.9.0"}"#);
        let mut checker = checker(&tool)
            .with_ignored_versions("rack", &[">= 3.0"])
            .unwrap();
        let outcome = checker
            .latest_resolvable_version(&rack(), UpdatePolicy::UnlockOwn)
            .unwrap();
        assert_eq!(outcome.resolved().unwrap().to_string(), "2.9.0");
        let probe = &tool.seen()[0];
        assert!(probe.content("deps.yml").unwrap().contains("< 3.0"));
    }

    #[test]
    fn resolving_to_an_ignored_version_is_no_result() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "1.6.2"}"#);
        let mut checker = checker(&tool)
            .with_ignored_versions("rack", &["~> 1.6.0"])
            .unwrap();
        let outcome = checker
            .latest_resolvable_version(&rack(), UpdatePolicy::UnlockOwn)
            .unwrap();
        assert_eq!(outcome, ResolutionOutcome::Unresolved);
    }

    #[test]
    fn conflicts_are_extracted_from_diagnostic() {
        let tool = ScriptedInvoker::new();
        tool.push_failure(
            "Bundler could not find compatible versions for gem \"rack\":\n\
             sinatra (2.0.1) was resolved to 2.0.1, which depends on\n  rack (~> 2.0)\n\
             rack-protection (2.0.1) was resolved to 2.0.1, which depends on\n  rack (>= 2.0.0)\n",
        );
        tool.push_success(r#"{"rack": "1.4.0"}"#);
        let mut checker = checker(&tool);
        let conflicts = checker
            .conflicting_dependencies(&rack(), &"1.9.0".parse().unwrap())
            .unwrap();
        assert_eq!(
            conflicts,
            vec![
                Conflict {
                    name: "sinatra".into(),
                    version: "2.0.1".into(),
                    violated_constraint: "~> 2.0".into(),
                },
                Conflict {
                    name: "rack-protection".into(),
                    version: "2.0.1".into(),
                    violated_constraint: ">= 2.0.0".into(),
                },
            ]
        );
    }

    #[test]
    fn resolvable_target_has_no_conflicts() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "1.4.5"}"#);
        let mut checker = checker(&tool);
        let conflicts = checker
            .conflicting_dependencies(&rack(), &"1.4.5".parse().unwrap())
            .unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn batch_results_keep_input_order() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "1.13.0", "sinatra": "2.2.0"}"#);
        tool.push_success(r#"{"rack": "1.13.0", "sinatra": "2.2.0"}"#);
        let mut checker = checker(&tool);
        let sinatra = Dependency::new("sinatra", "local")
            .with_version("2.0.1")
            .with_requirement(Requirement::new("deps.yml", ">= 2.0"));

        let results = checker.latest_resolvable_versions(&[rack(), sinatra], UpdatePolicy::UnlockOwn);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().resolved().unwrap().to_string(), "1.13.0");
        assert_eq!(results[1].as_ref().unwrap().resolved().unwrap().to_string(), "2.2.0");
        assert_eq!(tool.calls(), 2);

        // Resolvers went back into the cache.
        checker
            .latest_resolvable_version(&rack(), UpdatePolicy::UnlockOwn)
            .unwrap();
        assert_eq!(tool.calls(), 2);
    }

    #[test]
    fn unknown_requirement_file_is_rejected() {
        let tool = ScriptedInvoker::new();
        let mut checker = checker(&tool);
        let stray = Dependency::new("rack", "local").with_requirement(Requirement::new("Gemfile", "~> 1.4"));
        let result = checker.latest_resolvable_version(&stray, UpdatePolicy::UnlockOwn);
        assert!(matches!(result, Err(UpliftError::UnknownRequirementFile { .. })));
        assert_eq!(tool.calls(), 0);
    }

    #[test]
    fn force_reports_moved_packages() {
        let tool = ScriptedInvoker::new();
        tool.push_success(r#"{"rack": "2.0.0", "sinatra": "2.0.1", "rack-protection": "2.0.2"}"#);
        let mut checker = checker(&tool);
        let outcome = checker
            .force(&rack(), &"2.0.0".parse().unwrap(), UpdateStrategy::BumpVersions)
            .unwrap();
        let names: Vec<&str> = outcome.resolved().unwrap().iter().map(Dependency::name).collect();
        assert_eq!(names, vec!["rack", "rack-protection"]);
    }

    #[test]
    fn selects_only_configured_ecosystem() {
        let mut config = UpliftConfig::default();
        assert!(select_ecosystem(&config, None).is_err());
        config.ecosystems.insert("local".into(), Default::default());
        assert_eq!(select_ecosystem(&config, None).unwrap(), "local");
        config.ecosystems.insert("other".into(), Default::default());
        assert!(select_ecosystem(&config, None).is_err());
        assert_eq!(select_ecosystem(&config, Some("other")).unwrap(), "other");
    }
}
