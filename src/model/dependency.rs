//! Dependencies and their requirements.

use crate::version::ResolvedVersion;
use serde::{Deserialize, Serialize};

/// Where a requirement is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementSource {
    /// A package registry (default registry when `url` is absent).
    Registry {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A VCS repository.
    Git(GitSource),
    /// A local filesystem path.
    Path { path: String },
}

impl RequirementSource {
    /// The git locator, if this is a VCS source.
    pub fn as_git(&self) -> Option<&GitSource> {
        match self {
            RequirementSource::Git(g) => Some(g),
            _ => None,
        }
    }
}

/// A VCS locator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitSource {
    /// Repository URL.
    pub url: String,
    /// Branch the requirement follows, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Tag or other fixed reference, if any.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Pinned commit the lock file records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// How a git requirement is pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitPin {
    /// Follows a moving branch.
    Branch(String),
    /// Fixed to a tag or ref.
    Reference(String),
}

impl GitSource {
    /// The pin mechanism, preferring an explicit ref over a branch.
    pub fn pin(&self) -> Option<GitPin> {
        if let Some(r) = &self.reference {
            return Some(GitPin::Reference(r.clone()));
        }
        self.branch.as_ref().map(|b| GitPin::Branch(b.clone()))
    }

    /// Whether a branch or ref is set.
    pub fn is_pinned(&self) -> bool {
        self.branch.is_some() || self.reference.is_some()
    }
}

/// One declaration of a dependency in one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// File the requirement was declared in.
    pub file: String,
    /// Constraint text in the ecosystem's syntax (`None` when unconstrained).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
    /// Group or scope tags, e.g. `runtime`, `development`. Display only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Source descriptor, if not the default registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RequirementSource>,
}

impl Requirement {
    /// A registry requirement with constraint text.
    pub fn new(file: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            requirement: Some(requirement.into()),
            groups: Vec::new(),
            source: None,
        }
    }

    /// Set the groups.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Set the source.
    pub fn with_source(mut self, source: RequirementSource) -> Self {
        self.source = Some(source);
        self
    }

    /// The git source, if any.
    pub fn git_source(&self) -> Option<&GitSource> {
        self.source.as_ref().and_then(RequirementSource::as_git)
    }
}

/// A package within one resolution unit.
///
/// Values are built once per check and never mutated; an updated package is a
/// new value made with [`Dependency::updated`], which remembers where it came
/// from so callers can diff the two states.
///
/// # Example
///
/// ```
/// use uplift::model::{Dependency, Requirement};
///
/// let dep = Dependency::new("rack", "bundler")
///     .with_version("1.4.0")
///     .with_requirement(Requirement::new("Gemfile", "~> 1.4.0"));
///
/// let next = dep.updated("1.13.0", vec![Requirement::new("Gemfile", "~> 1.13.0")]);
/// assert_eq!(next.previous_version(), Some("1.4.0"));
/// assert_eq!(dep.version(), Some("1.4.0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default)]
    requirements: Vec<Requirement>,
    package_manager: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_requirements: Option<Vec<Requirement>>,
}

impl Dependency {
    /// Start building a dependency.
    pub fn new(name: impl Into<String>, package_manager: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            requirements: Vec::new(),
            package_manager: package_manager.into(),
            previous_version: None,
            previous_requirements: None,
        }
    }

    /// Set the current version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a requirement.
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// The "after" value: same package, new version and requirements.
    pub fn updated(&self, version: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            name: self.name.clone(),
            version: Some(version.into()),
            requirements,
            package_manager: self.package_manager.clone(),
            previous_version: self.version.clone(),
            previous_requirements: Some(self.requirements.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The current version interpreted as a version or revision.
    pub fn resolved_version(&self) -> Option<ResolvedVersion> {
        self.version.as_deref().map(ResolvedVersion::parse)
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn package_manager(&self) -> &str {
        &self.package_manager
    }

    pub fn previous_version(&self) -> Option<&str> {
        self.previous_version.as_deref()
    }

    pub fn previous_requirements(&self) -> Option<&[Requirement]> {
        self.previous_requirements.as_deref()
    }

    /// The first git source among the requirements.
    pub fn git_source(&self) -> Option<&GitSource> {
        self.requirements.iter().find_map(Requirement::git_source)
    }

    /// Names of the files the requirements live in, deduplicated.
    pub fn requirement_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for r in &self.requirements {
            if !files.contains(&r.file.as_str()) {
                files.push(&r.file);
            }
        }
        files
    }
}
