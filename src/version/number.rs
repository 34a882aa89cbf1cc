//! Version numbers and resolved identifiers.

use crate::error::{Result, UpliftError};
use semver::Prerelease;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A dotted version number with any number of numeric segments.
///
/// Ecosystems disagree on how many segments a version has (`1.4`, `1.4.0`,
/// `2.0.0.1`), so segments are compared zero-padded: `1.4 == 1.4.0`. The
/// number of segments actually written is kept as the version's *precision*
/// so rewritten requirements can keep the style they were written in.
///
/// # Example
///
/// ```
/// use uplift::version::Version;
///
/// let v: Version = "1.13.0".parse().unwrap();
/// assert!(v > "1.4.0".parse().unwrap());
/// assert_eq!(v.precision(), 3);
/// assert_eq!(v.truncated(2).to_string(), "1.13");
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    pre: Prerelease,
}

impl Version {
    /// Parse version text such as `1.4.0`, `v2.0`, `1.0.0-beta.1` or `1.0.0.rc1`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || UpliftError::InvalidVersion {
            input: input.to_string(),
        };

        let text = input.trim();
        let text = text.strip_prefix('v').unwrap_or(text);
        // Build metadata never participates in ordering.
        let text = text.split('+').next().unwrap_or_default();
        if text.is_empty() {
            return Err(invalid());
        }

        let (release, pre) = match text.split_once('-') {
            Some((release, pre)) => (release, Some(pre.to_string())),
            None => (text, None),
        };

        let mut segments = Vec::new();
        let mut gem_pre: Vec<&str> = Vec::new();
        for part in release.split('.') {
            if !gem_pre.is_empty() {
                gem_pre.push(part);
                continue;
            }
            match part.parse::<u64>() {
                Ok(n) => segments.push(n),
                // rubygems style: 1.0.0.rc1 starts a pre-release at the first
                // non-numeric segment
                Err(_) if !segments.is_empty() && !part.is_empty() => gem_pre.push(part),
                Err(_) => return Err(invalid()),
            }
        }

        let pre_text = match pre {
            Some(p) => Some(p),
            None if !gem_pre.is_empty() => Some(gem_pre.join(".")),
            None => None,
        };
        let pre = match pre_text {
            Some(p) => Prerelease::new(&p).map_err(|_| invalid())?,
            None => Prerelease::EMPTY,
        };

        if segments.is_empty() {
            return Err(invalid());
        }

        Ok(Self { segments, pre })
    }

    /// Build a release version from raw segments.
    pub fn from_segments(segments: Vec<u64>) -> Self {
        let segments = if segments.is_empty() { vec![0] } else { segments };
        Self {
            segments,
            pre: Prerelease::EMPTY,
        }
    }

    /// The zero version, used as the floor when nothing better is known.
    pub fn zero() -> Self {
        Self::from_segments(vec![0])
    }

    /// Written segments.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Number of written segments.
    pub fn precision(&self) -> usize {
        self.segments.len()
    }

    /// Number of segments up to and including the last non-zero one.
    pub fn significant_precision(&self) -> usize {
        self.segments
            .iter()
            .rposition(|s| *s != 0)
            .map(|i| i + 1)
            .unwrap_or(1)
    }

    /// Pre-release identifier, empty for releases.
    pub fn pre(&self) -> &Prerelease {
        &self.pre
    }

    /// Whether this is a pre-release.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Segment at `index`, zero when not written.
    pub fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }

    /// Keep the first `precision` segments, padding with zeros if needed.
    ///
    /// The result is always a release.
    pub fn truncated(&self, precision: usize) -> Self {
        let precision = precision.max(1);
        Self::from_segments((0..precision).map(|i| self.segment(i)).collect())
    }

    /// Increment the segment at `index` and drop everything after it.
    ///
    /// `1.4.2` bumped at 1 is `1.5`; bumped at 0 it is `2`.
    pub fn bump(&self, index: usize) -> Self {
        let mut segments: Vec<u64> = (0..=index).map(|i| self.segment(i)).collect();
        segments[index] = segments[index].saturating_add(1);
        Self::from_segments(segments)
    }

    /// Convert to a three-part semantic version.
    pub fn to_semver(&self) -> semver::Version {
        let mut v = semver::Version::new(self.segment(0), self.segment(1), self.segment(2));
        v.pre = self.pre.clone();
        v
    }

    fn cmp_segments(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_segments(other).then_with(|| {
            match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            }
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments[..self.significant_precision()].hash(state);
        self.pre.as_str().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        if self.pre.is_empty() {
            write!(f, "{}", text)
        } else {
            write!(f, "{}-{}", text, self.pre)
        }
    }
}

impl FromStr for Version {
    type Err = UpliftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// What a resolution produced for one dependency.
///
/// Most ecosystems resolve to a version number, but VCS-pinned dependencies
/// resolve to a content-addressed identifier such as a commit hash. Both are
/// carried uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedVersion {
    /// A released version.
    Version(Version),
    /// An opaque identifier (commit SHA, digest).
    Revision(String),
}

impl ResolvedVersion {
    /// Interpret tool output text as a version or a revision.
    ///
    /// Hex strings of 7 to 40 characters that contain a letter, or are a full
    /// 40-character SHA, are revisions. Anything that parses as a version is a
    /// version; everything else is kept as an opaque revision.
    pub fn parse(input: &str) -> Self {
        let text = input.trim();
        if looks_like_revision(text) {
            return ResolvedVersion::Revision(text.to_string());
        }
        match Version::parse(text) {
            Ok(v) => ResolvedVersion::Version(v),
            Err(_) => ResolvedVersion::Revision(text.to_string()),
        }
    }

    /// The version, if this is one.
    pub fn as_version(&self) -> Option<&Version> {
        match self {
            ResolvedVersion::Version(v) => Some(v),
            ResolvedVersion::Revision(_) => None,
        }
    }

    /// Whether this is an opaque revision.
    pub fn is_revision(&self) -> bool {
        matches!(self, ResolvedVersion::Revision(_))
    }
}

fn looks_like_revision(text: &str) -> bool {
    let len = text.len();
    if !(7..=40).contains(&len) || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    len == 40 || text.chars().any(|c| c.is_ascii_alphabetic())
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedVersion::Version(v) => write!(f, "{}", v),
            ResolvedVersion::Revision(r) => write!(f, "{}", r),
        }
    }
}

impl From<Version> for ResolvedVersion {
    fn from(v: Version) -> Self {
        ResolvedVersion::Version(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parses_plain_versions() {
        assert_eq!(v("1.4.0").segments(), &[1, 4, 0]);
        assert_eq!(v("v2.0").segments(), &[2, 0]);
        assert_eq!(v("3").precision(), 1);
    }

    #[test]
    fn parses_prereleases() {
        assert!(v("1.0.0-beta.1").is_prerelease());
        assert_eq!(v("1.0.0.rc1").pre().as_str(), "rc1");
        assert_eq!(v("1.0.0.rc1").segments(), &[1, 0, 0]);
    }

    #[test]
    fn ignores_build_metadata() {
        assert_eq!(v("1.2.3+build.5"), v("1.2.3"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1..2").is_err());
    }

    #[test]
    fn compares_zero_padded() {
        assert_eq!(v("1.4"), v("1.4.0"));
        assert!(v("1.13.0") > v("1.4.0"));
        assert!(v("2") > v("1.99.99"));
    }

    #[test]
    fn prerelease_sorts_before_release() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-rc.1") > v("0.9.9"));
    }

    #[test]
    fn equal_versions_hash_equally() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(v("1.4"));
        assert!(set.contains(&v("1.4.0")));
    }

    #[test]
    fn bump_drops_lower_segments() {
        assert_eq!(v("1.4.2").bump(1).to_string(), "1.5");
        assert_eq!(v("1.4.2").bump(0).to_string(), "2");
        assert_eq!(v("1").bump(1).to_string(), "1.1");
    }

    #[test]
    fn bump_saturates_at_max_segment() {
        let max = format!("1.{}", u64::MAX);
        assert_eq!(v(&max).bump(1), v(&max));
    }

    #[test]
    fn significant_precision_ignores_trailing_zeros() {
        assert_eq!(v("1.13.0").significant_precision(), 2);
        assert_eq!(v("0.0.0").significant_precision(), 1);
        assert_eq!(v("1.0.2").significant_precision(), 3);
    }

    #[test]
    fn converts_to_semver() {
        let s = v("1.2").to_semver();
        assert_eq!(s, semver::Version::new(1, 2, 0));
    }

    #[test]
    fn resolved_version_detects_revisions() {
        assert!(ResolvedVersion::parse("a1b2c3d").is_revision());
        assert!(ResolvedVersion::parse(&"0".repeat(40)).is_revision());
        assert!(!ResolvedVersion::parse("1234567").is_revision());
        assert_eq!(
            ResolvedVersion::parse("1.13.0").as_version(),
            Some(&v("1.13.0"))
        );
        assert!(ResolvedVersion::parse("main@{tip}").is_revision());
    }
}
