//! Rewriting requirement text for a newly resolved version.
//!
//! Pure functions, no I/O. The output of every strategy, parsed back with
//! the same grammar, is satisfied by the resolved version.

use crate::error::Result;
use crate::model::{Requirement, RequirementSource, UpdateStrategy};
use crate::version::{ceiling_for, Clause, Constraint, Operator, ResolvedVersion, Version};
use tracing::debug;

/// Rewrite `requirements` so they admit `resolved`.
///
/// When `updated_source` is given and differs from a requirement's source,
/// the source and the text are replaced together. A revision leaves the
/// text alone and records itself on the git source.
///
/// # Example
///
/// ```
/// use uplift::model::{Requirement, UpdateStrategy};
/// use uplift::updater::update_requirements;
/// use uplift::version::ResolvedVersion;
///
/// let updated = update_requirements(
///     &[Requirement::new("Gemfile", "~> 1.4.0")],
///     &ResolvedVersion::parse("1.13.0"),
///     UpdateStrategy::BumpVersions,
///     None,
/// )
/// .unwrap();
/// assert_eq!(updated[0].requirement.as_deref(), Some("~> 1.13.0"));
/// ```
pub fn update_requirements(
    requirements: &[Requirement],
    resolved: &ResolvedVersion,
    strategy: UpdateStrategy,
    updated_source: Option<&RequirementSource>,
) -> Result<Vec<Requirement>> {
    requirements
        .iter()
        .map(|r| update_requirement(r, resolved, strategy, updated_source))
        .collect()
}

fn update_requirement(
    requirement: &Requirement,
    resolved: &ResolvedVersion,
    strategy: UpdateStrategy,
    updated_source: Option<&RequirementSource>,
) -> Result<Requirement> {
    let source_changed = updated_source.is_some_and(|s| requirement.source.as_ref() != Some(s));
    let mut source = match updated_source {
        Some(s) if source_changed => Some(s.clone()),
        _ => requirement.source.clone(),
    };

    let text = match resolved {
        ResolvedVersion::Revision(revision) => {
            if let Some(RequirementSource::Git(git)) = source.as_mut() {
                git.revision = Some(revision.clone());
            }
            requirement.requirement.clone()
        }
        ResolvedVersion::Version(version) => {
            let parsed = requirement
                .requirement
                .as_deref()
                .map(Constraint::parse)
                .transpose()?;
            match parsed {
                Some(constraint) if !constraint.is_any() => {
                    Some(rewrite(&constraint, version, strategy).to_string())
                }
                // A source that stopped being git needs a version to point at.
                _ if source_changed && requirement.git_source().is_some() => {
                    Some(Clause::new(Operator::GreaterEq, version.clone()).to_string())
                }
                _ => requirement.requirement.clone(),
            }
        }
    };

    if text != requirement.requirement || source != requirement.source {
        debug!(
            "{}: '{}' -> '{}'",
            requirement.file,
            requirement.requirement.as_deref().unwrap_or("*"),
            text.as_deref().unwrap_or("*")
        );
    }

    Ok(Requirement {
        requirement: text,
        source,
        ..requirement.clone()
    })
}

/// Apply `strategy` to one parsed constraint.
pub fn rewrite(constraint: &Constraint, version: &Version, strategy: UpdateStrategy) -> Constraint {
    let clauses = constraint
        .clauses()
        .iter()
        .flat_map(|clause| match strategy {
            UpdateStrategy::BumpVersions => bump(clause, version),
            UpdateStrategy::BumpVersionsIfNecessary if clause.matches(version) => {
                vec![clause.clone()]
            }
            UpdateStrategy::BumpVersionsIfNecessary => bump(clause, version),
            UpdateStrategy::WidenRanges => widen(clause, version),
        })
        .collect::<Vec<_>>();
    // One spaced clause widened into two reads best comma-separated.
    if constraint.clauses().len() == 1 && clauses.len() > 1 && constraint.to_string().contains(' ') {
        Constraint::from_clauses(clauses)
    } else {
        constraint.with_clauses(clauses)
    }
}

/// Re-anchor a clause on `version`, keeping its operator.
fn bump(clause: &Clause, version: &Version) -> Vec<Clause> {
    let anchor = anchor(version, clause.version.precision());
    match clause.op {
        Operator::Exact | Operator::GreaterEq | Operator::Pessimistic | Operator::Caret | Operator::Tilde => {
            vec![clause.with_version(anchor)]
        }
        Operator::Greater => vec![clause.restyled(Operator::GreaterEq, anchor)],
        Operator::Less | Operator::LessEq | Operator::NotEqual if clause.matches(version) => {
            vec![clause.clone()]
        }
        Operator::Less => vec![clause.with_version(next_major(version, clause))],
        Operator::LessEq => vec![clause.with_version(anchor)],
        Operator::NotEqual => Vec::new(),
    }
}

/// Extend a clause so it admits `version` without giving up anything it
/// admitted before.
fn widen(clause: &Clause, version: &Version) -> Vec<Clause> {
    if clause.matches(version) {
        return vec![clause.clone()];
    }
    let anchor = anchor(version, clause.version.precision());
    match clause.op {
        Operator::Exact if *version > clause.version => vec![
            clause.restyled(Operator::GreaterEq, clause.version.clone()),
            clause.restyled(Operator::Less, next_major(version, clause)),
        ],
        Operator::Exact => vec![
            clause.restyled(Operator::GreaterEq, anchor),
            clause.restyled(Operator::LessEq, clause.version.clone()),
        ],
        Operator::Greater | Operator::GreaterEq => {
            vec![clause.restyled(Operator::GreaterEq, anchor)]
        }
        Operator::Less => vec![clause.with_version(next_major(version, clause))],
        Operator::LessEq => vec![clause.with_version(anchor)],
        Operator::NotEqual => Vec::new(),
        Operator::Pessimistic | Operator::Caret | Operator::Tilde => {
            let floor = if anchor < clause.version {
                anchor.clone()
            } else {
                clause.version.clone()
            };
            // The old ceiling stays when the new version sits below the floor.
            let ceiling = ceiling_for(clause.op, &anchor, anchor.precision())
                .into_iter()
                .chain(clause.ranged_ceiling())
                .max()
                .unwrap_or_else(|| version.bump(0))
                .truncated(anchor.precision().max(clause.version.precision()));
            vec![
                clause.restyled(Operator::GreaterEq, floor),
                clause.restyled(Operator::Less, ceiling),
            ]
        }
    }
}

/// `version` written at `precision` segments when that loses nothing.
fn anchor(version: &Version, precision: usize) -> Version {
    if !version.is_prerelease() && version.significant_precision() <= precision {
        version.truncated(precision)
    } else {
        version.clone()
    }
}

/// Exclusive ceiling one major above `version`, at the clause's precision.
fn next_major(version: &Version, clause: &Clause) -> Version {
    version.bump(0).truncated(clause.version.precision())
}
