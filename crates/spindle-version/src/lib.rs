//! Parsing and ordering for the dotted-numeric version scheme used by
//! [`spindle_requirement::Requirement`] predicates.
//!
//! A [`Version`] is a release segment (`1.0.2`) with an optional
//! pre-release suffix (`a1`, `b2`, `rc3`). Releases sort above their own
//! pre-releases; otherwise release segments compare lexicographically,
//! zero-padded to the longer length.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

mod predicate;

pub use predicate::{Operator, VersionPredicate, VersionSpec};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
    #[error("invalid version segment in {0:?}")]
    InvalidSegment(String),
    #[error("unrecognized pre-release label in {0:?}")]
    UnknownPrereleaseLabel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrereleaseLabel {
    Alpha,
    Beta,
    Rc,
}

impl PrereleaseLabel {
    fn as_str(self) -> &'static str {
        match self {
            PrereleaseLabel::Alpha => "a",
            PrereleaseLabel::Beta => "b",
            PrereleaseLabel::Rc => "rc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Prerelease {
    pub label: PrereleaseLabel,
    pub number: u64,
}

impl fmt::Display for Prerelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.label.as_str(), self.number)
    }
}

#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub release: Vec<u64>,
    pub pre: Option<Prerelease>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VersionError::Empty);
        }

        let pre_start = input.find(|c: char| c.is_ascii_alphabetic());
        let (release_part, pre_part) = match pre_start {
            Some(idx) => (&input[..idx], Some(&input[idx..])),
            None => (input, None),
        };

        if release_part.is_empty() {
            return Err(VersionError::InvalidSegment(input.to_string()));
        }

        let mut release = Vec::new();
        for segment in release_part.trim_end_matches('.').split('.') {
            let n = segment
                .parse::<u64>()
                .map_err(|_| VersionError::InvalidSegment(input.to_string()))?;
            release.push(n);
        }

        let pre = match pre_part {
            None => None,
            Some(raw) => Some(parse_prerelease(raw, input)?),
        };

        Ok(Version { release, pre })
    }

    /// Release segments, zero-padded to `len`.
    fn release_padded(&self, len: usize) -> Vec<u64> {
        let mut r = self.release.clone();
        r.resize(len, 0);
        r
    }
}

fn parse_prerelease(raw: &str, whole: &str) -> Result<Prerelease, VersionError> {
    let digits_start = raw
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| VersionError::UnknownPrereleaseLabel(whole.to_string()))?;
    let (label_str, number_str) = raw.split_at(digits_start);
    let label = match label_str {
        "a" | "alpha" => PrereleaseLabel::Alpha,
        "b" | "beta" => PrereleaseLabel::Beta,
        "rc" | "c" => PrereleaseLabel::Rc,
        other => return Err(VersionError::UnknownPrereleaseLabel(other.to_string())),
    };
    let number = number_str
        .parse::<u64>()
        .map_err(|_| VersionError::InvalidSegment(whole.to_string()))?;
    Ok(Prerelease { label, number })
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = self
            .release
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{release}")?;
        if let Some(pre) = &self.pre {
            write!(f, "{pre}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        let a = self.release_padded(len);
        let b = other.release_padded(len);
        match a.cmp(&b) {
            Ordering::Equal => {}
            ord => return ord,
        }
        // Same release: a final release sorts above its own pre-releases.
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_release() {
        let v = Version::parse("1.0.2").unwrap();
        assert_eq!(v.release, vec![1, 0, 2]);
        assert!(v.pre.is_none());
    }

    #[test]
    fn parses_prerelease_suffix() {
        let v = Version::parse("1.0.0a1").unwrap();
        assert_eq!(v.release, vec![1, 0, 0]);
        assert_eq!(
            v.pre,
            Some(Prerelease {
                label: PrereleaseLabel::Alpha,
                number: 1
            })
        );
    }

    #[test]
    fn release_sorts_above_prerelease() {
        let release = Version::parse("1.0.0").unwrap();
        let pre = Version::parse("1.0.0rc1").unwrap();
        assert!(release > pre);
    }

    #[test]
    fn shorter_release_pads_with_zero() {
        assert_eq!(
            Version::parse("1.0").unwrap(),
            Version::parse("1.0.0").unwrap()
        );
        assert!(Version::parse("1.1").unwrap() > Version::parse("1.0.9").unwrap());
    }

    #[test]
    fn prerelease_labels_order_alpha_beta_rc() {
        assert!(Version::parse("1.0.0b1").unwrap() > Version::parse("1.0.0a5").unwrap());
        assert!(Version::parse("1.0.0rc1").unwrap() > Version::parse("1.0.0b9").unwrap());
    }
}
