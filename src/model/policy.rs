//! Update policy and strategy enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much of the dependency graph a probe may disturb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Keep the original requirement and every lock entry.
    NoUnlock,
    /// Relax the dependency's own requirement and lock entry.
    #[default]
    UnlockOwn,
    /// Let anything move.
    UnlockAll,
}

impl UpdatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdatePolicy::NoUnlock => "no_unlock",
            UpdatePolicy::UnlockOwn => "unlock_own",
            UpdatePolicy::UnlockAll => "unlock_all",
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "no_unlock" | "none" => Ok(UpdatePolicy::NoUnlock),
            "unlock_own" | "own" => Ok(UpdatePolicy::UnlockOwn),
            "unlock_all" | "all" => Ok(UpdatePolicy::UnlockAll),
            other => Err(format!("unknown update policy '{}'", other)),
        }
    }
}

/// How requirement text is rewritten once a target version is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// Re-anchor every clause on the new version.
    #[default]
    BumpVersions,
    /// Re-anchor only clauses the new version violates.
    BumpVersionsIfNecessary,
    /// Extend ranges so they admit both the old floor and the new version.
    WidenRanges,
}

impl UpdateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStrategy::BumpVersions => "bump_versions",
            UpdateStrategy::BumpVersionsIfNecessary => "bump_versions_if_necessary",
            UpdateStrategy::WidenRanges => "widen_ranges",
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UpdateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "bump_versions" | "bump" => Ok(UpdateStrategy::BumpVersions),
            "bump_versions_if_necessary" | "bump_if_necessary" => {
                Ok(UpdateStrategy::BumpVersionsIfNecessary)
            }
            "widen_ranges" | "widen" => Ok(UpdateStrategy::WidenRanges),
            other => Err(format!("unknown update strategy '{}'", other)),
        }
    }
}
