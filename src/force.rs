//! Forcing a dependency to a specific version.
//!
//! A forced update asks the tool for `name = target` with everything else
//! unlocked, then reports only the packages whose resolved version actually
//! moved.

use crate::classify::ErrorKind;
use crate::error::Result;
use crate::model::{Dependency, UpdatePolicy, UpdateStrategy};
use crate::probe::ProbeRequest;
use crate::resolver::{ResolutionFailure, ResolutionOutcome, VersionResolver};
use crate::updater::update_requirements;
use crate::version::{ResolvedVersion, Version};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Computes the full set of changes a forced update needs.
pub struct ForceUpdater<'r> {
    resolver: &'r mut VersionResolver,
    strategy: UpdateStrategy,
}

impl<'r> ForceUpdater<'r> {
    pub fn new(resolver: &'r mut VersionResolver) -> Self {
        Self {
            resolver,
            strategy: UpdateStrategy::default(),
        }
    }

    /// Strategy for the forced dependency's own requirements.
    ///
    /// Co-dependencies are always rewritten only where necessary.
    pub fn with_strategy(mut self, strategy: UpdateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Every dependency that must change for `dependency` to reach `target`.
    ///
    /// The forced dependency comes first, then co-dependencies by name.
    /// Packages whose version does not change are left out.
    pub fn force(
        &mut self,
        dependency: &Dependency,
        target: &Version,
    ) -> Result<ResolutionOutcome<Vec<Dependency>>> {
        let request = ProbeRequest::new(dependency.clone(), UpdatePolicy::UnlockAll)
            .with_target(target.clone());
        let outcome = self.resolver.resolve_set(&request)?;

        let resolved = match outcome {
            ResolutionOutcome::Resolved(set) => set,
            ResolutionOutcome::Unresolved => return Ok(ResolutionOutcome::Unresolved),
            ResolutionOutcome::Failed(failure) => return Ok(ResolutionOutcome::Failed(failure)),
        };

        let wanted = ResolvedVersion::Version(target.clone());
        match resolved.get(dependency.name()).map(|v| ResolvedVersion::parse(v)) {
            Some(version) if version == wanted => {}
            other => {
                let got = other.map(|v| v.to_string()).unwrap_or_else(|| "nothing".into());
                info!(
                    "'{}' cannot be forced to {}: tool resolved {}",
                    dependency.name(),
                    target,
                    got
                );
                return Ok(ResolutionOutcome::Failed(ResolutionFailure::new(
                    ErrorKind::NotResolvable,
                    format!(
                        "'{}' resolved to {} instead of {}",
                        dependency.name(),
                        got,
                        target
                    ),
                )));
            }
        }

        let before = self
            .resolver
            .ecosystem()
            .probe_builder()
            .locked_versions(self.resolver.files())?;

        let mut updated = vec![self.updated(dependency, &wanted, self.strategy)?];
        for (name, version) in &resolved {
            if name == dependency.name() {
                continue;
            }
            let version = ResolvedVersion::parse(version);
            let previous = before.get(name).map(|v| ResolvedVersion::parse(v));
            if previous.as_ref() == Some(&version) {
                continue;
            }
            let current = self.current(name, &before)?;
            updated.push(self.updated(&current, &version, UpdateStrategy::BumpVersionsIfNecessary)?);
        }

        debug!(
            "Forcing '{}' to {} changes {} package(s)",
            dependency.name(),
            target,
            updated.len()
        );
        Ok(ResolutionOutcome::Resolved(updated))
    }

    /// The co-dependency as the project declares it today.
    fn current(&self, name: &str, locked: &BTreeMap<String, String>) -> Result<Dependency> {
        let ecosystem = self.resolver.ecosystem();
        Ok(match ecosystem.dependency(self.resolver.files(), name)? {
            Some(dep) => dep,
            None => {
                let dep = Dependency::new(name, ecosystem.name());
                match locked.get(name) {
                    Some(version) => dep.with_version(version.clone()),
                    None => dep,
                }
            }
        })
    }

    fn updated(
        &self,
        dependency: &Dependency,
        version: &ResolvedVersion,
        strategy: UpdateStrategy,
    ) -> Result<Dependency> {
        let requirements = update_requirements(dependency.requirements(), version, strategy, None)?;
        Ok(dependency.updated(version.to_string(), requirements))
    }
}
