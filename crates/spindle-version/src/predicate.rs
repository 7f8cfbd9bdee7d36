use std::fmt;

use crate::{Version, VersionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `~=`: compatible release, e.g. `~=1.4.5` means `>=1.4.5, ==1.4.*`.
    Compatible,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Compatible => "~=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PredicateError {
    #[error("empty predicate")]
    Empty,
    #[error("unrecognized comparison operator in {0:?}")]
    UnknownOperator(String),
    #[error(transparent)]
    Version(#[from] VersionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPredicate {
    pub op: Operator,
    pub version: Version,
}

impl VersionPredicate {
    pub fn parse(input: &str) -> Result<Self, PredicateError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PredicateError::Empty);
        }

        const OPERATORS: &[(&str, Operator)] = &[
            ("~=", Operator::Compatible),
            ("==", Operator::Eq),
            ("!=", Operator::Ne),
            ("<=", Operator::Le),
            (">=", Operator::Ge),
            ("<", Operator::Lt),
            (">", Operator::Gt),
        ];

        let (op, rest) = OPERATORS
            .iter()
            .find(|(prefix, _)| input.starts_with(prefix))
            .map(|(prefix, op)| (*op, &input[prefix.len()..]))
            .ok_or_else(|| PredicateError::UnknownOperator(input.to_string()))?;

        let version = Version::parse(rest.trim())?;
        Ok(VersionPredicate { op, version })
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            Operator::Eq => candidate == &self.version,
            Operator::Ne => candidate != &self.version,
            Operator::Lt => candidate < &self.version,
            Operator::Le => candidate <= &self.version,
            Operator::Gt => candidate > &self.version,
            Operator::Ge => candidate >= &self.version,
            Operator::Compatible => self.matches_compatible(candidate),
        }
    }

    fn matches_compatible(&self, candidate: &Version) -> bool {
        if self.version.release.len() < 2 {
            // `~=1` has no meaningful prefix to pin; degrade to `>=`.
            return candidate >= &self.version;
        }
        let prefix_len = self.version.release.len() - 1;
        let mut want = self.version.release[..prefix_len].to_vec();
        want.resize(prefix_len, 0);
        let mut have = candidate.release.clone();
        have.resize(prefix_len.max(have.len()), 0);
        have.truncate(prefix_len);
        have == want && candidate >= &self.version
    }
}

impl fmt::Display for VersionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// An intersection of predicates: a candidate version must satisfy all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionSpec(pub Vec<VersionPredicate>);

impl VersionSpec {
    pub fn empty() -> Self {
        VersionSpec(Vec::new())
    }

    pub fn parse(input: &str) -> Result<Self, PredicateError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(VersionSpec::empty());
        }
        let predicates = input
            .split(',')
            .map(VersionPredicate::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(VersionSpec(predicates))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        self.0.iter().all(|p| p.matches(candidate))
    }

    /// Intersection of two predicate sets: a candidate must satisfy both.
    #[must_use]
    pub fn intersect(&self, other: &VersionSpec) -> VersionSpec {
        let mut predicates = self.0.clone();
        predicates.extend(other.0.iter().cloned());
        VersionSpec(predicates)
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_predicate() {
        let p = VersionPredicate::parse("==0.1.2").unwrap();
        assert_eq!(p.op, Operator::Eq);
        assert_eq!(p.version, Version::parse("0.1.2").unwrap());
    }

    #[test]
    fn parses_spec_list() {
        let spec = VersionSpec::parse(">0.1.0,<2.0.0").unwrap();
        assert_eq!(spec.0.len(), 2);
        assert!(spec.matches(&Version::parse("1.0.0").unwrap()));
        assert!(!spec.matches(&Version::parse("2.0.0").unwrap()));
    }

    #[test]
    fn compatible_release_pins_prefix() {
        let spec = VersionSpec::parse("~=1.4.5").unwrap();
        assert!(spec.matches(&Version::parse("1.4.5").unwrap()));
        assert!(spec.matches(&Version::parse("1.4.9").unwrap()));
        assert!(!spec.matches(&Version::parse("1.5.0").unwrap()));
        assert!(!spec.matches(&Version::parse("1.4.4").unwrap()));
    }

    #[test]
    fn intersection_requires_both() {
        let a = VersionSpec::parse(">0.1.0").unwrap();
        let b = VersionSpec::parse(">=0.1.2").unwrap();
        let both = a.intersect(&b);
        assert!(!both.matches(&Version::parse("0.1.1").unwrap()));
        assert!(both.matches(&Version::parse("0.1.2").unwrap()));
    }
}
