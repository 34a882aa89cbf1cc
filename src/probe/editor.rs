//! The seam between the probe builder and an ecosystem's file grammar.

use crate::error::Result;
use crate::model::RequirementSource;
use crate::version::Constraint;
use std::collections::BTreeMap;

/// One declaration of a dependency as the manifest holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Constraint text, empty when the entry has none.
    pub constraint: String,
    pub source: Option<RequirementSource>,
}

/// A rewrite applied to every entry naming one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEdit {
    /// New constraint text per entry, in the order
    /// [`entries`](ManifestEditor::entries) lists them. Entries past the end
    /// keep their text.
    pub constraints: Vec<String>,
    /// Remove branch and ref pins from a VCS source.
    pub strip_pin: bool,
    /// Replace the ref pin of a VCS source.
    pub replace_pin: Option<String>,
}

impl EntryEdit {
    /// Give all `count` entries the same constraint text.
    pub fn uniform(constraint: impl Into<String>, count: usize) -> Self {
        Self {
            constraints: vec![constraint.into(); count],
            ..Self::default()
        }
    }

    /// Constraint text for the entry at `index`.
    pub fn constraint_for(&self, index: usize) -> Option<&str> {
        self.constraints.get(index).map(String::as_str)
    }

    /// Whether applying the edit would change nothing.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && !self.strip_pin && self.replace_pin.is_none()
    }
}

/// Reads and rewrites one ecosystem's manifest and lock file.
///
/// Implementations own the grammar. The probe builder only ever asks for
/// entries and hands back edits, so it never parses a manifest itself.
pub trait ManifestEditor: Send + Sync {
    /// File name of the manifest within the project file set.
    fn manifest_name(&self) -> &str;

    /// File name of the lock file, if the ecosystem has one.
    fn lockfile_name(&self) -> Option<&str>;

    /// Every entry in `manifest` declaring `dependency`.
    fn entries(&self, manifest: &str, dependency: &str) -> Result<Vec<ManifestEntry>>;

    /// `manifest` with `edit` applied to every entry declaring `dependency`.
    fn rewrite(&self, manifest: &str, dependency: &str, edit: &EntryEdit) -> Result<String>;

    /// Every package and version recorded in `lockfile`.
    fn locked_versions(&self, lockfile: &str) -> Result<BTreeMap<String, String>>;

    /// `lockfile` without the entries for `dependencies`.
    fn unlock(&self, lockfile: &str, dependencies: &[&str]) -> Result<String>;

    /// Version recorded for `dependency`.
    fn locked_version(&self, lockfile: &str, dependency: &str) -> Result<Option<String>> {
        Ok(self.locked_versions(lockfile)?.remove(dependency))
    }

    /// Render a constraint in the manifest's syntax.
    fn format_constraint(&self, constraint: &Constraint) -> String {
        constraint.to_string()
    }
}
