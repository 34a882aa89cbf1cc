//! The YAML manifest format used by command-driven ecosystems.
//!
//! `deps.yml` declares dependencies in a `dependencies` section and an
//! optional `dev_dependencies` section. An entry is either a bare constraint
//! string or a mapping:
//!
//! ```yaml
//! dependencies:
//!   rack: "~> 1.4.0"
//!   toolkit:
//!     version: ">= 2.0"
//!     git: https://github.com/acme/toolkit
//!     ref: v2.1.0
//!   local-lib:
//!     path: ../local-lib
//! dev_dependencies:
//!   rspec: "~> 3.12"
//! ```
//!
//! `deps.lock` is a flat mapping of package name to resolved version (or
//! commit for VCS packages).

use crate::error::{Result, UpliftError};
use crate::model::{Dependency, GitSource, ProjectFileSet, Requirement, RequirementSource};
use crate::probe::{EntryEdit, ManifestEditor, ManifestEntry};
use crate::version::ResolvedVersion;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

pub const DEFAULT_MANIFEST: &str = "deps.yml";
pub const DEFAULT_LOCKFILE: &str = "deps.lock";

/// Manifest sections and the group tag each one gives its requirements.
const SECTIONS: &[(&str, &str)] = &[
    ("dependencies", "runtime"),
    ("dev_dependencies", "development"),
];

/// [`ManifestEditor`] for `deps.yml` / `deps.lock`.
#[derive(Debug, Clone)]
pub struct YamlManifestEditor {
    manifest: String,
    lockfile: Option<String>,
}

impl YamlManifestEditor {
    pub fn new(manifest: impl Into<String>, lockfile: Option<String>) -> Self {
        Self {
            manifest: manifest.into(),
            lockfile,
        }
    }

    /// Read `name` out of `files` as a [`Dependency`].
    ///
    /// Each manifest section declaring it becomes one requirement, tagged
    /// with the section's group. The current version comes from the lock
    /// file. `None` when neither file mentions the package.
    pub fn dependency(
        &self,
        files: &ProjectFileSet,
        package_manager: &str,
        name: &str,
    ) -> Result<Option<Dependency>> {
        let doc = match files.content(&self.manifest) {
            Some(content) => self.parse(&self.manifest, content)?,
            None => Value::Null,
        };
        let locked = match self.lockfile.as_deref().and_then(|lock| files.content(lock)) {
            Some(lock) => self.locked_version(lock, name)?,
            None => None,
        };

        let requirements: Vec<Requirement> = SECTIONS
            .iter()
            .filter_map(|(section, group)| {
                let parsed = parse_entry(entry(&doc, section, name)?, locked.as_deref());
                Some(Requirement {
                    file: self.manifest.clone(),
                    requirement: Some(parsed.constraint).filter(|c| !c.is_empty()),
                    groups: vec![group.to_string()],
                    source: parsed.source,
                })
            })
            .collect();

        if requirements.is_empty() && locked.is_none() {
            return Ok(None);
        }

        let mut dependency = Dependency::new(name, package_manager);
        if let Some(version) = locked {
            dependency = dependency.with_version(version);
        }
        Ok(Some(
            requirements
                .into_iter()
                .fold(dependency, Dependency::with_requirement),
        ))
    }

    fn parse(&self, file: &str, content: &str) -> Result<Value> {
        if content.trim().is_empty() {
            return Ok(Value::Mapping(Mapping::new()));
        }
        serde_yaml::from_str(content).map_err(|e| UpliftError::ManifestEdit {
            file: file.to_string(),
            message: e.to_string(),
        })
    }

    fn render(&self, file: &str, doc: &Value) -> Result<String> {
        serde_yaml::to_string(doc).map_err(|e| UpliftError::ManifestEdit {
            file: file.to_string(),
            message: e.to_string(),
        })
    }

    fn lock_name(&self) -> &str {
        self.lockfile.as_deref().unwrap_or(DEFAULT_LOCKFILE)
    }
}

impl Default for YamlManifestEditor {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST, Some(DEFAULT_LOCKFILE.to_string()))
    }
}

fn entry<'a>(doc: &'a Value, section: &str, dependency: &str) -> Option<&'a Value> {
    doc.get(section)?.get(dependency)
}

/// Scalar as text; YAML happily reads `1.4` as a float.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_text)
}

fn parse_entry(value: &Value, locked: Option<&str>) -> ManifestEntry {
    if let Some(text) = scalar_text(value) {
        return ManifestEntry {
            constraint: text,
            source: None,
        };
    }

    let constraint = field(value, "version").unwrap_or_default();
    let source = if let Some(url) = field(value, "git") {
        let revision = locked
            .map(ResolvedVersion::parse)
            .filter(ResolvedVersion::is_revision)
            .map(|r| r.to_string());
        Some(RequirementSource::Git(GitSource {
            url,
            branch: field(value, "branch"),
            reference: field(value, "ref"),
            revision,
        }))
    } else if let Some(path) = field(value, "path") {
        Some(RequirementSource::Path { path })
    } else {
        field(value, "registry").map(|url| RequirementSource::Registry { url: Some(url) })
    };

    ManifestEntry { constraint, source }
}

fn edit_entry(value: &mut Value, constraint: Option<&str>, edit: &EntryEdit) {
    if let Some(constraint) = constraint {
        if scalar_text(value).is_some() || value.is_null() {
            *value = Value::from(constraint);
            return;
        }
    }
    let Some(map) = value.as_mapping_mut() else {
        return;
    };
    if let Some(constraint) = constraint {
        map.insert(Value::from("version"), Value::from(constraint));
    }
    if edit.strip_pin {
        map.remove("branch");
        map.remove("ref");
    }
    if let Some(reference) = &edit.replace_pin {
        map.insert(Value::from("ref"), Value::from(reference.as_str()));
    }
}

impl ManifestEditor for YamlManifestEditor {
    fn manifest_name(&self) -> &str {
        &self.manifest
    }

    fn lockfile_name(&self) -> Option<&str> {
        self.lockfile.as_deref()
    }

    fn entries(&self, manifest: &str, dependency: &str) -> Result<Vec<ManifestEntry>> {
        let doc = self.parse(&self.manifest, manifest)?;
        Ok(SECTIONS
            .iter()
            .filter_map(|(section, _)| entry(&doc, section, dependency))
            .map(|value| parse_entry(value, None))
            .collect())
    }

    fn rewrite(&self, manifest: &str, dependency: &str, edit: &EntryEdit) -> Result<String> {
        if edit.is_empty() {
            return Ok(manifest.to_string());
        }
        let mut doc = self.parse(&self.manifest, manifest)?;
        let mut touched = 0;
        for (section, _) in SECTIONS {
            if let Some(value) = doc
                .get_mut(*section)
                .and_then(|s| s.get_mut(dependency))
            {
                edit_entry(value, edit.constraint_for(touched), edit);
                touched += 1;
            }
        }
        if touched == 0 {
            return Ok(manifest.to_string());
        }
        self.render(&self.manifest, &doc)
    }

    fn locked_versions(&self, lockfile: &str) -> Result<BTreeMap<String, String>> {
        let doc = self.parse(self.lock_name(), lockfile)?;
        let Some(map) = doc.as_mapping() else {
            return Err(UpliftError::ManifestEdit {
                file: self.lock_name().to_string(),
                message: "expected a mapping of package names to versions".to_string(),
            });
        };
        Ok(map
            .iter()
            .filter_map(|(k, v)| Some((scalar_text(k)?, scalar_text(v)?)))
            .collect())
    }

    fn unlock(&self, lockfile: &str, dependencies: &[&str]) -> Result<String> {
        let mut doc = self.parse(self.lock_name(), lockfile)?;
        if let Some(map) = doc.as_mapping_mut() {
            for name in dependencies {
                map.remove(*name);
            }
        }
        self.render(self.lock_name(), &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GitPin, ProjectFile};

    const MANIFEST: &str = r#"
dependencies:
  rack: "~> 1.4.0"
  toolkit:
    version: ">= 2.0"
    git: https://github.com/acme/toolkit
    ref: v2.1.0
  follower:
    git: https://github.com/acme/follower
    branch: main
  local-lib:
    path: ../local-lib
dev_dependencies:
  rack: ">= 1.0"
  legacy: 1.4
"#;

    const LOCK: &str = "rack: \"1.4.0\"\ntoolkit: 0123456789abcdef0123456789abcdef01234567\nsinatra: \"2.0.1\"\n";

    fn editor() -> YamlManifestEditor {
        YamlManifestEditor::default()
    }

    fn files() -> ProjectFileSet {
        ProjectFileSet::new(vec![
            ProjectFile::new(DEFAULT_MANIFEST, MANIFEST),
            ProjectFile::new(DEFAULT_LOCKFILE, LOCK),
        ])
    }

    #[test]
    fn entries_cover_every_section() {
        let entries = editor().entries(MANIFEST, "rack").unwrap();
        let constraints: Vec<_> = entries.iter().map(|e| e.constraint.as_str()).collect();
        assert_eq!(constraints, vec!["~> 1.4.0", ">= 1.0"]);
    }

    #[test]
    fn dependency_reads_requirements_and_lock() {
        let dep = editor().dependency(&files(), "local", "rack").unwrap().unwrap();
        assert_eq!(dep.version(), Some("1.4.0"));
        assert_eq!(dep.package_manager(), "local");
        let groups: Vec<_> = dep
            .requirements()
            .iter()
            .map(|r| (r.requirement.as_deref(), r.groups[0].as_str()))
            .collect();
        assert_eq!(
            groups,
            vec![(Some("~> 1.4.0"), "runtime"), (Some(">= 1.0"), "development")]
        );
    }

    #[test]
    fn lock_only_dependency_has_no_requirements() {
        let dep = editor().dependency(&files(), "local", "sinatra").unwrap().unwrap();
        assert_eq!(dep.version(), Some("2.0.1"));
        assert!(dep.requirements().is_empty());
        assert!(editor().dependency(&files(), "local", "absent").unwrap().is_none());
    }

    #[test]
    fn numeric_constraints_read_as_text() {
        let entries = editor().entries(MANIFEST, "legacy").unwrap();
        assert_eq!(entries[0].constraint, "1.4");
    }

    #[test]
    fn git_entries_expose_pins() {
        let toolkit = &editor().entries(MANIFEST, "toolkit").unwrap()[0];
        let git = toolkit.source.as_ref().and_then(RequirementSource::as_git).unwrap();
        assert_eq!(git.pin(), Some(GitPin::Reference("v2.1.0".into())));

        let follower = &editor().entries(MANIFEST, "follower").unwrap()[0];
        let git = follower.source.as_ref().and_then(RequirementSource::as_git).unwrap();
        assert_eq!(git.pin(), Some(GitPin::Branch("main".into())));
        assert_eq!(follower.constraint, "");
    }

    #[test]
    fn rewrite_updates_every_entry() {
        let edit = EntryEdit::uniform(">= 1.4.0", 2);
        let out = editor().rewrite(MANIFEST, "rack", &edit).unwrap();
        let entries = editor().entries(&out, "rack").unwrap();
        assert!(entries.iter().all(|e| e.constraint == ">= 1.4.0"));
        // Other entries survive the round trip.
        assert_eq!(editor().entries(&out, "toolkit").unwrap().len(), 1);
    }

    #[test]
    fn rewrite_gives_each_entry_its_own_constraint() {
        let edit = EntryEdit {
            constraints: vec!["~> 1.4.0, <= 1.4.9".into(), ">= 1.0, <= 1.4.9".into()],
            ..EntryEdit::default()
        };
        let out = editor().rewrite(MANIFEST, "rack", &edit).unwrap();
        let constraints: Vec<_> = editor()
            .entries(&out, "rack")
            .unwrap()
            .into_iter()
            .map(|e| e.constraint)
            .collect();
        assert_eq!(constraints, vec!["~> 1.4.0, <= 1.4.9", ">= 1.0, <= 1.4.9"]);
    }

    #[test]
    fn empty_edit_keeps_manifest_text() {
        let out = editor()
            .rewrite(MANIFEST, "rack", &EntryEdit::default())
            .unwrap();
        assert_eq!(out, MANIFEST);
    }

    #[test]
    fn rewrite_strips_and_replaces_pins() {
        let strip = EntryEdit {
            strip_pin: true,
            ..EntryEdit::default()
        };
        let out = editor().rewrite(MANIFEST, "toolkit", &strip).unwrap();
        let git = editor().entries(&out, "toolkit").unwrap()[0]
            .source
            .clone()
            .unwrap();
        assert_eq!(git.as_git().unwrap().pin(), None);

        let replace = EntryEdit {
            replace_pin: Some("v3.0.0".into()),
            ..EntryEdit::default()
        };
        let out = editor().rewrite(MANIFEST, "toolkit", &replace).unwrap();
        let git = editor().entries(&out, "toolkit").unwrap()[0]
            .source
            .clone()
            .unwrap();
        assert_eq!(
            git.as_git().unwrap().pin(),
            Some(GitPin::Reference("v3.0.0".into()))
        );
    }

    #[test]
    fn rewrite_of_unknown_dependency_is_identity() {
        let out = editor()
            .rewrite(MANIFEST, "missing", &EntryEdit::default())
            .unwrap();
        assert_eq!(out, MANIFEST);
    }

    #[test]
    fn lock_lookup_and_unlock() {
        assert_eq!(
            editor().locked_version(LOCK, "rack").unwrap(),
            Some("1.4.0".into())
        );
        let unlocked = editor().unlock(LOCK, &["rack"]).unwrap();
        let versions = editor().locked_versions(&unlocked).unwrap();
        assert!(!versions.contains_key("rack"));
        assert_eq!(versions.get("sinatra").map(String::as_str), Some("2.0.1"));
    }

    #[test]
    fn lock_revisions_become_git_revisions() {
        let dep = editor().dependency(&files(), "local", "toolkit").unwrap().unwrap();
        let git = dep.git_source().unwrap();
        assert_eq!(
            git.revision.as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert_eq!(dep.requirements()[0].requirement.as_deref(), Some(">= 2.0"));
    }

    #[test]
    fn malformed_manifest_is_an_edit_error() {
        let err = editor().entries("dependencies: [", "rack").unwrap_err();
        assert!(matches!(err, UpliftError::ManifestEdit { .. }));
    }
}
