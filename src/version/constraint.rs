//! Requirement constraint grammar.
//!
//! Constraint text is a list of clauses separated by commas (or whitespace,
//! npm style), each an operator followed by a version:
//!
//! | Operator | Meaning |
//! |---|---|
//! | `=`, `==`, bare | exactly this version |
//! | `!=` | anything but this version |
//! | `>`, `>=`, `<`, `<=` | comparisons |
//! | `~>` | pessimistic: `~> 1.4.0` is `>= 1.4.0, < 1.5` |
//! | `^` | caret: bump the first non-zero written segment |
//! | `~` | tilde: bump minor if two or more segments are written |
//!
//! `*` and the empty string accept any version.

use super::number::Version;
use crate::error::{Result, UpliftError};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Exact,
    NotEqual,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Pessimistic,
    Caret,
    Tilde,
}

impl Operator {
    /// Operators in longest-first order so prefix matching is unambiguous.
    const TOKENS: &'static [(&'static str, Operator)] = &[
        ("~>", Operator::Pessimistic),
        (">=", Operator::GreaterEq),
        ("<=", Operator::LessEq),
        ("!=", Operator::NotEqual),
        ("==", Operator::Exact),
        ("=", Operator::Exact),
        (">", Operator::Greater),
        ("<", Operator::Less),
        ("^", Operator::Caret),
        ("~", Operator::Tilde),
    ];

    /// Canonical token for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exact => "=",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterEq => ">=",
            Operator::Less => "<",
            Operator::LessEq => "<=",
            Operator::Pessimistic => "~>",
            Operator::Caret => "^",
            Operator::Tilde => "~",
        }
    }

    /// Whether the clause bounds versions from above only.
    pub fn is_upper_only(&self) -> bool {
        matches!(self, Operator::Less | Operator::LessEq)
    }

    /// Whether the operator implies a range with an upper bound derived from
    /// the written precision.
    pub fn is_ranged(&self) -> bool {
        matches!(
            self,
            Operator::Pessimistic | Operator::Caret | Operator::Tilde
        )
    }

    fn split_prefix(text: &str) -> Option<(Operator, &str)> {
        Self::TOKENS
            .iter()
            .find(|(token, _)| text.starts_with(token))
            .map(|(token, op)| (*op, &text[token.len()..]))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `operator version` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub op: Operator,
    pub version: Version,
    /// The operator was written (`= 1.0` rather than `1.0`).
    explicit: bool,
    /// A space separated operator and version (`~> 1.4` rather than `~>1.4`).
    spaced: bool,
}

impl Clause {
    /// Build a clause in the `op version` spaced style.
    pub fn new(op: Operator, version: Version) -> Self {
        Self {
            op,
            version,
            explicit: true,
            spaced: true,
        }
    }

    /// Same operator and layout, different version.
    pub fn with_version(&self, version: Version) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// Same layout, different operator and version.
    pub fn restyled(&self, op: Operator, version: Version) -> Self {
        Self {
            op,
            version,
            explicit: true,
            spaced: self.spaced,
        }
    }

    /// Whether this clause admits `candidate`.
    pub fn matches(&self, candidate: &Version) -> bool {
        let v = &self.version;
        match self.op {
            Operator::Exact => candidate == v,
            Operator::NotEqual => candidate != v,
            Operator::Greater => candidate > v,
            Operator::GreaterEq => candidate >= v,
            Operator::Less => candidate < v,
            Operator::LessEq => candidate <= v,
            Operator::Pessimistic | Operator::Caret | Operator::Tilde => {
                candidate >= v && self.ranged_ceiling().is_none_or(|c| *candidate < c)
            }
        }
    }

    /// Exclusive ceiling implied by a ranged operator at the written precision.
    pub fn ranged_ceiling(&self) -> Option<Version> {
        ceiling_for(self.op, &self.version, self.version.precision())
    }

    /// Lower bound of this clause, if it has one.
    pub fn lower_bound(&self) -> Option<&Version> {
        match self.op {
            Operator::Exact
            | Operator::Greater
            | Operator::GreaterEq
            | Operator::Pessimistic
            | Operator::Caret
            | Operator::Tilde => Some(&self.version),
            Operator::NotEqual | Operator::Less | Operator::LessEq => None,
        }
    }

    /// The clause admitting exactly what this one rejects, where one exists.
    ///
    /// Ranged operators have no single-clause complement.
    pub fn negated(&self) -> Option<Clause> {
        let op = match self.op {
            Operator::Exact => Operator::NotEqual,
            Operator::NotEqual => Operator::Exact,
            Operator::Greater => Operator::LessEq,
            Operator::GreaterEq => Operator::Less,
            Operator::Less => Operator::GreaterEq,
            Operator::LessEq => Operator::Greater,
            Operator::Pessimistic | Operator::Caret | Operator::Tilde => return None,
        };
        Some(Clause::new(op, self.version.clone()))
    }

    fn parse(text: &str) -> Result<Self> {
        let invalid = |message: &str| UpliftError::InvalidConstraint {
            input: text.to_string(),
            message: message.to_string(),
        };

        let trimmed = text.trim();
        let (op, rest, explicit) = match Operator::split_prefix(trimmed) {
            Some((op, rest)) => (op, rest, true),
            None => (Operator::Exact, trimmed, false),
        };
        let spaced = rest.starts_with(char::is_whitespace);
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(invalid("missing version"));
        }
        let version = Version::parse(rest).map_err(|_| invalid("unparseable version"))?;

        Ok(Self {
            op,
            version,
            explicit,
            spaced,
        })
    }
}

/// Exclusive ceiling of a ranged operator for a version written with
/// `precision` segments.
pub fn ceiling_for(op: Operator, version: &Version, precision: usize) -> Option<Version> {
    let precision = precision.max(1);
    match op {
        Operator::Pessimistic => Some(version.bump(precision.saturating_sub(2))),
        Operator::Caret => {
            let index = (0..precision)
                .find(|i| version.segment(*i) != 0)
                .unwrap_or(precision - 1);
            Some(version.bump(index))
        }
        Operator::Tilde => Some(version.bump(if precision >= 2 { 1 } else { 0 })),
        _ => None,
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.explicit && self.op == Operator::Exact {
            return write!(f, "{}", self.version);
        }
        if self.spaced {
            write!(f, "{} {}", self.op, self.version)
        } else {
            write!(f, "{}{}", self.op, self.version)
        }
    }
}

/// A parsed constraint: every clause must hold.
///
/// # Example
///
/// ```
/// use uplift::version::{Constraint, Version};
///
/// let c: Constraint = "~> 1.4.0".parse().unwrap();
/// assert!(c.matches(&"1.4.9".parse().unwrap()));
/// assert!(!c.matches(&"1.5.0".parse().unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Constraint {
    clauses: Vec<Clause>,
    separator: Separator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
enum Separator {
    #[default]
    Comma,
    Space,
}

impl Constraint {
    /// Parse constraint text.
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.trim();
        if text.is_empty() || text == "*" {
            return Ok(Self::default());
        }

        let separator = if text.contains(',') {
            Separator::Comma
        } else {
            Separator::Space
        };

        let mut clauses = Vec::new();
        for chunk in text.split(',') {
            for piece in split_clauses(chunk.trim()) {
                clauses.push(Clause::parse(&piece)?);
            }
        }

        Ok(Self { clauses, separator })
    }

    /// Constraint from clauses, rendered comma-separated.
    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        Self {
            clauses,
            separator: Separator::Comma,
        }
    }

    /// Same rendering style, different clauses.
    pub fn with_clauses(&self, clauses: Vec<Clause>) -> Self {
        Self {
            clauses,
            separator: self.separator,
        }
    }

    /// The clauses in written order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Whether the constraint places no restriction.
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether every clause admits `candidate`.
    pub fn matches(&self, candidate: &Version) -> bool {
        self.clauses.iter().all(|c| c.matches(candidate))
    }

    /// Smallest lower bound across the clauses.
    pub fn lowest_floor(&self) -> Option<&Version> {
        self.clauses.iter().filter_map(Clause::lower_bound).min()
    }
}

/// Split `>= 1.0 < 2.0` into `>= 1.0` and `< 2.0`.
///
/// A token that is only an operator binds to the token after it.
fn split_clauses(chunk: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut pending: Option<&str> = None;
    for token in chunk.split_whitespace() {
        match pending.take() {
            Some(op) => pieces.push(format!("{} {}", op, token)),
            None => {
                let is_bare_op = Operator::split_prefix(token)
                    .map(|(_, rest)| rest.is_empty())
                    .unwrap_or(false);
                if is_bare_op {
                    pending = Some(token);
                } else {
                    pieces.push(token.to_string());
                }
            }
        }
    }
    if let Some(op) = pending {
        pieces.push(op.to_string());
    }
    pieces
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = match self.separator {
            Separator::Comma => ", ",
            Separator::Space => " ",
        };
        let text = self
            .clauses
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(sep);
        write!(f, "{}", text)
    }
}

impl FromStr for Constraint {
    type Err = UpliftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn c(s: &str) -> Constraint {
        Constraint::parse(s).unwrap()
    }

    #[test]
    fn pessimistic_respects_precision() {
        assert!(c("~> 1.4.0").matches(&v("1.4.7")));
        assert!(!c("~> 1.4.0").matches(&v("1.5.0")));
        assert!(c("~> 1.4").matches(&v("1.13.0")));
        assert!(!c("~> 1.4").matches(&v("2.0")));
        assert!(c("~> 1").matches(&v("1.9")));
        assert!(!c("~> 1").matches(&v("2.0")));
    }

    #[test]
    fn caret_bumps_first_nonzero() {
        assert!(c("^1.2").matches(&v("1.9.0")));
        assert!(!c("^1.2").matches(&v("2.0.0")));
        assert!(c("^0.2.3").matches(&v("0.2.9")));
        assert!(!c("^0.2.3").matches(&v("0.3.0")));
    }

    #[test]
    fn tilde_bumps_minor() {
        assert!(c("~1.2.3").matches(&v("1.2.9")));
        assert!(!c("~1.2.3").matches(&v("1.3.0")));
        assert!(c("~1").matches(&v("1.8")));
    }

    #[test]
    fn comparison_clauses_combine() {
        let range = c(">= 1.0, < 2.0");
        assert!(range.matches(&v("1.5")));
        assert!(!range.matches(&v("2.0")));
        assert!(!range.matches(&v("0.9")));
    }

    #[test]
    fn space_separated_clauses() {
        let range = c(">=1.0 <2.0");
        assert_eq!(range.clauses().len(), 2);
        assert_eq!(range.to_string(), ">=1.0 <2.0");

        let spaced = c(">= 1.0 < 2.0");
        assert_eq!(spaced.clauses().len(), 2);
        assert_eq!(spaced.to_string(), ">= 1.0 < 2.0");
    }

    #[test]
    fn bare_version_is_exact() {
        let exact = c("1.4.0");
        assert!(exact.matches(&v("1.4")));
        assert!(!exact.matches(&v("1.4.1")));
        assert_eq!(exact.to_string(), "1.4.0");
    }

    #[test]
    fn star_and_empty_match_anything() {
        assert!(c("*").is_any());
        assert!(c("").matches(&v("99.0")));
    }

    #[test]
    fn display_preserves_style() {
        assert_eq!(c("~> 1.4.0").to_string(), "~> 1.4.0");
        assert_eq!(c("^1.2").to_string(), "^1.2");
        assert_eq!(c(">= 1.0,< 2").to_string(), ">= 1.0, < 2");
    }

    #[test]
    fn lowest_floor_takes_minimum() {
        assert_eq!(c(">= 1.2, < 3").lowest_floor(), Some(&v("1.2")));
        assert_eq!(c("< 3").lowest_floor(), None);
    }

    #[test]
    fn rejects_missing_version() {
        assert!(Constraint::parse(">=").is_err());
        assert!(Constraint::parse("~> banana").is_err());
    }

    #[test]
    fn negation_complements_simple_clauses() {
        let ignore = c(">= 3.0").clauses()[0].negated().unwrap();
        assert_eq!(ignore.to_string(), "< 3.0");
        assert!(ignore.matches(&v("2.9.9")));
        assert!(!ignore.matches(&v("3.0")));

        let exact = c("2.5.0").clauses()[0].negated().unwrap();
        assert_eq!(exact.to_string(), "!= 2.5.0");
        assert!(c("~> 2.0").clauses()[0].negated().is_none());
    }
}
