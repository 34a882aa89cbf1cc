//! Project file sets.

use crate::error::{Result, UpliftError};
use crate::model::Dependency;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// A named file's content, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectFile {
    pub name: String,
    pub content: String,
}

impl ProjectFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The files that make up one resolvable unit.
///
/// A set is never changed in place. Every edit returns a new set, so the
/// caller's files stay exactly as they were no matter how many probes are
/// derived from them.
///
/// # Example
///
/// ```
/// use uplift::model::{ProjectFile, ProjectFileSet};
///
/// let original = ProjectFileSet::new(vec![ProjectFile::new("Gemfile", "gem 'rack'")]);
/// let probe = original.with_content("Gemfile", "gem 'rack', '>= 1.4'");
///
/// assert_eq!(original.content("Gemfile"), Some("gem 'rack'"));
/// assert_eq!(probe.content("Gemfile"), Some("gem 'rack', '>= 1.4'"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProjectFileSet {
    files: Vec<ProjectFile>,
}

impl ProjectFileSet {
    /// Build a set; a later file with an existing name replaces the earlier one.
    pub fn new(files: Vec<ProjectFile>) -> Self {
        files
            .into_iter()
            .fold(Self::default(), |set, f| set.with_content(&f.name, f.content))
    }

    /// Read the named files from a project directory.
    ///
    /// Missing files are skipped; the directory is only read.
    pub fn load(root: &Path, names: &[&str]) -> Result<Self> {
        let mut files = Vec::new();
        for name in names {
            let path = root.join(name);
            if !path.is_file() {
                continue;
            }
            files.push(ProjectFile::new(*name, fs::read_to_string(&path)?));
        }
        Ok(Self::new(files))
    }

    /// Files in order.
    pub fn files(&self) -> &[ProjectFile] {
        &self.files
    }

    pub fn get(&self, name: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn content(&self, name: &str) -> Option<&str> {
        self.get(name).map(|f| f.content.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// A copy with `name` set to `content` (replacing or appending).
    pub fn with_content(&self, name: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut files = self.files.clone();
        match files.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.content = content,
            None => files.push(ProjectFile::new(name, content)),
        }
        Self { files }
    }

    /// A copy without `name`.
    pub fn without(&self, name: &str) -> Self {
        Self {
            files: self
                .files
                .iter()
                .filter(|f| f.name != name)
                .cloned()
                .collect(),
        }
    }

    /// Stable digest of names and contents.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(file.content.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }

    /// Check that every requirement of `dependency` points into this set.
    pub fn validate_dependency(&self, dependency: &Dependency) -> Result<()> {
        for file in dependency.requirement_files() {
            if !self.contains(file) {
                return Err(UpliftError::UnknownRequirementFile {
                    dependency: dependency.name().to_string(),
                    file: file.to_string(),
                });
            }
        }
        Ok(())
    }
}
