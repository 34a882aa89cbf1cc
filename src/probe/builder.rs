//! Building disposable probe files from a project's originals.

use super::editor::{EntryEdit, ManifestEditor, ManifestEntry};
use super::patch::PatchPipeline;
use crate::error::{Result, UpliftError};
use crate::model::{Dependency, GitPin, ProjectFileSet, RequirementSource, UpdatePolicy};
use crate::version::{Clause, Constraint, Operator, Version};
use std::collections::BTreeMap;
use tracing::debug;

/// The question a probe asks the resolution tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub dependency: Dependency,
    pub policy: UpdatePolicy,
    /// New ref for a ref-pinned VCS entry.
    pub pin_replacement: Option<String>,
    /// Highest acceptable version, inclusive.
    pub upper_bound: Option<Version>,
    /// Ask for exactly this version.
    pub target: Option<Version>,
    /// Remove branch/ref pins even without a full unlock.
    pub unpin_git: bool,
    /// Extra clauses keeping ignored versions out of the answer.
    pub exclusions: Vec<Clause>,
}

impl ProbeRequest {
    pub fn new(dependency: Dependency, policy: UpdatePolicy) -> Self {
        Self {
            dependency,
            policy,
            pin_replacement: None,
            upper_bound: None,
            target: None,
            unpin_git: false,
            exclusions: Vec::new(),
        }
    }

    pub fn with_pin_replacement(mut self, reference: impl Into<String>) -> Self {
        self.pin_replacement = Some(reference.into());
        self
    }

    pub fn with_upper_bound(mut self, bound: Version) -> Self {
        self.upper_bound = Some(bound);
        self
    }

    pub fn with_target(mut self, target: Version) -> Self {
        self.target = Some(target);
        self
    }

    pub fn unpinned(mut self) -> Self {
        self.unpin_git = true;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Vec<Clause>) -> Self {
        self.exclusions = exclusions;
        self
    }
}

/// Produces probe file sets. One implementation per file grammar.
pub trait ProbeBuilder: Send + Sync {
    /// A new file set asking `request`. `original` is never modified.
    fn build(&self, original: &ProjectFileSet, request: &ProbeRequest) -> Result<ProjectFileSet>;

    /// Versions the project's lock file records, empty without one.
    fn locked_versions(&self, files: &ProjectFileSet) -> Result<BTreeMap<String, String>>;
}

/// Probe builder driven by a [`ManifestEditor`].
///
/// # Policy effects
///
/// | Policy | Lock file | Temporary constraint |
/// |---|---|---|
/// | `no_unlock` | kept | original text, plus `<= ceiling` |
/// | `unlock_own` | own entry removed | `>= floor`, plus `<= ceiling` |
/// | `unlock_all` | dropped, pins stripped | `>= floor`, plus `<= ceiling` |
///
/// The floor is the locked version, else the loosest lower bound written in
/// the manifest, else `0`. Exclusions for ignored versions sit next to the
/// ceiling. A forced target replaces all of this with `= target`.
pub struct ManifestProbeBuilder<E> {
    editor: E,
    patches: PatchPipeline,
}

impl<E: ManifestEditor> ManifestProbeBuilder<E> {
    pub fn new(editor: E) -> Self {
        Self {
            editor,
            patches: PatchPipeline::builtin(),
        }
    }

    pub fn with_patches(mut self, patches: PatchPipeline) -> Self {
        self.patches = patches;
        self
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    fn invalid(request: &ProbeRequest, message: impl Into<String>) -> UpliftError {
        UpliftError::InvalidProbeState {
            dependency: request.dependency.name().to_string(),
            message: message.into(),
        }
    }

    fn lockfile<'a>(&self, files: &'a ProjectFileSet) -> Option<(&'a str, &'a str)> {
        let name = self.editor.lockfile_name()?;
        let file = files.get(name)?;
        Some((file.name.as_str(), file.content.as_str()))
    }

    /// Check a pin replacement is possible on every entry.
    fn check_pin_replacement(
        &self,
        request: &ProbeRequest,
        entries: &[ManifestEntry],
    ) -> Result<()> {
        if entries.is_empty() {
            return Err(Self::invalid(request, "no manifest entry to re-pin"));
        }
        for entry in entries {
            let git = match &entry.source {
                Some(RequirementSource::Git(git)) => git,
                _ => return Err(Self::invalid(request, "not a VCS dependency")),
            };
            match git.pin() {
                Some(GitPin::Reference(_)) => {}
                Some(GitPin::Branch(branch)) => {
                    return Err(Self::invalid(
                        request,
                        format!(
                            "pinned to branch '{}'; branch pins cannot be replaced",
                            branch
                        ),
                    ))
                }
                None => return Err(Self::invalid(request, "VCS entry has no ref pin to replace")),
            }
        }
        Ok(())
    }

    /// The temporary constraint for each entry, empty to keep what is written.
    fn probe_constraints(
        &self,
        request: &ProbeRequest,
        entries: &[ManifestEntry],
        locked: Option<&str>,
    ) -> Result<Vec<Constraint>> {
        if let Some(target) = &request.target {
            let exact = Constraint::from_clauses(vec![Clause::new(Operator::Exact, target.clone())]);
            return Ok(vec![exact; entries.len()]);
        }

        let bounds: Vec<Clause> = request
            .upper_bound
            .clone()
            .map(|v| Clause::new(Operator::LessEq, v))
            .into_iter()
            .chain(request.exclusions.iter().cloned())
            .collect();

        if request.policy == UpdatePolicy::NoUnlock {
            if bounds.is_empty() {
                return Ok(Vec::new());
            }
            // Each entry keeps its own requirement as the lower bound.
            return entries
                .iter()
                .map(|entry| {
                    let base = Constraint::parse(&entry.constraint)?;
                    let mut clauses = base.clauses().to_vec();
                    clauses.extend(bounds.iter().cloned());
                    Ok(if base.clauses().len() > 1 {
                        base.with_clauses(clauses)
                    } else {
                        Constraint::from_clauses(clauses)
                    })
                })
                .collect();
        }

        let floor = self.floor(entries, locked);
        let mut clauses = vec![Clause::new(Operator::GreaterEq, floor)];
        clauses.extend(bounds);
        Ok(vec![Constraint::from_clauses(clauses); entries.len()])
    }

    fn floor(&self, entries: &[ManifestEntry], locked: Option<&str>) -> Version {
        if let Some(version) = locked.and_then(|v| Version::parse(v).ok()) {
            return version;
        }
        entries
            .iter()
            .filter_map(|e| Constraint::parse(&e.constraint).ok())
            .filter_map(|c| c.lowest_floor().cloned())
            .min()
            .unwrap_or_else(Version::zero)
    }
}

impl<E: ManifestEditor> ProbeBuilder for ManifestProbeBuilder<E> {
    fn build(&self, original: &ProjectFileSet, request: &ProbeRequest) -> Result<ProjectFileSet> {
        original.validate_dependency(&request.dependency)?;

        let name = request.dependency.name();
        let manifest_name = self.editor.manifest_name();
        let manifest = original
            .content(manifest_name)
            .ok_or_else(|| Self::invalid(request, format!("{} is missing", manifest_name)))?;

        let entries = self.editor.entries(manifest, name)?;
        if request.pin_replacement.is_some() {
            self.check_pin_replacement(request, &entries)?;
        }

        let lockfile = self.lockfile(original);
        let locked = match lockfile {
            Some((_, content)) => self.editor.locked_version(content, name)?,
            None => None,
        };

        let mut probe = original.clone();

        if !entries.is_empty() {
            let constraints = self.probe_constraints(request, &entries, locked.as_deref())?;
            let edit = EntryEdit {
                constraints: constraints
                    .iter()
                    .map(|c| self.editor.format_constraint(c))
                    .collect(),
                strip_pin: request.policy == UpdatePolicy::UnlockAll || request.unpin_git,
                replace_pin: request.pin_replacement.clone(),
            };
            debug!(
                "Probe for '{}' ({}): {:?}",
                name, request.policy, edit.constraints
            );
            if !edit.is_empty() {
                let rewritten = self.editor.rewrite(manifest, name, &edit)?;
                probe = probe.with_content(manifest_name, rewritten);
            }
        }

        if let Some((lock_name, content)) = lockfile {
            probe = match request.policy {
                UpdatePolicy::NoUnlock => probe,
                UpdatePolicy::UnlockOwn => {
                    probe.with_content(lock_name, self.editor.unlock(content, &[name])?)
                }
                UpdatePolicy::UnlockAll => probe.without(lock_name),
            };
        }

        Ok(self
            .patches
            .apply(&probe, manifest_name, self.editor.lockfile_name()))
    }

    fn locked_versions(&self, files: &ProjectFileSet) -> Result<BTreeMap<String, String>> {
        match self.lockfile(files) {
            Some((_, content)) => self.editor.locked_versions(content),
            None => Ok(BTreeMap::new()),
        }
    }
}
