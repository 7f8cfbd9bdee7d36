//! Requirement parsing and package-name normalization.
//!
//! A [`Requirement`] is either a name with an optional [`VersionSpec`]
//! predicate set, or a URL (`http`, `https`, `file`, or `git+*`).
//! URL-form requirements bypass the Finder stage of the pipeline.

use std::fmt;

use spindle_version::{PredicateError, VersionSpec};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("empty requirement")]
    Empty,
    #[error("unbalanced parentheses in requirement {0:?}")]
    UnbalancedParens(String),
    #[error("invalid predicate set in requirement {0:?}: {1}")]
    Predicate(String, #[source] PredicateError),
    #[error("unsupported URL scheme {0:?}, expected http, https, file, or git+*")]
    UnsupportedScheme(String),
    #[error("invalid URL in requirement {0:?}: {1}")]
    Url(String, #[source] url::ParseError),
}

/// A package name normalized per PEP 503: lowercased, with runs of
/// `-`, `_`, and `.` folded to a single `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageName(String);

impl PackageName {
    pub fn new(raw: &str) -> Self {
        PackageName(normalize_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for c in raw.trim().chars() {
        if c == '-' || c == '_' || c == '.' {
            if !last_was_sep && !out.is_empty() {
                out.push('-');
            }
            last_was_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRequirement {
    pub name: PackageName,
    pub predicates: VersionSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementUrl {
    pub url: Url,
    /// Raw scheme as written, preserving the `git+` prefix form.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Named(NamedRequirement),
    Url(RequirementUrl),
}

const ACCEPTED_SCHEMES: &[&str] = &["http", "https", "file"];

/// True for anything shaped like a URL requirement, whether or not its
/// scheme is one we accept — callers that need the accept/reject decision
/// should go through [`Requirement::parse`], which reports
/// [`RequirementError::UnsupportedScheme`] for the rest.
pub fn is_url(input: &str) -> bool {
    input.starts_with("git+") || input.contains("://")
}

impl Requirement {
    /// Parse `"<name>[ (<predicates>)]"` or a URL of scheme `http`, `https`,
    /// `file`, or `git+*`.
    pub fn parse(input: &str) -> Result<Self, RequirementError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RequirementError::Empty);
        }

        if is_url(trimmed) {
            return Self::parse_url(trimmed);
        }

        let (name_part, predicate_part) = split_predicates(trimmed)?;
        let predicates = if let Some(inner) = predicate_part {
            VersionSpec::parse(inner)
                .map_err(|e| RequirementError::Predicate(trimmed.to_string(), e))?
        } else {
            VersionSpec::empty()
        };

        Ok(Requirement::Named(NamedRequirement {
            name: PackageName::new(name_part),
            predicates,
        }))
    }

    fn parse_url(trimmed: &str) -> Result<Self, RequirementError> {
        let is_git = trimmed.starts_with("git+");
        let bare = trimmed.strip_prefix("git+").unwrap_or(trimmed);
        let url = Url::parse(bare).map_err(|e| RequirementError::Url(trimmed.to_string(), e))?;
        if !is_git && !ACCEPTED_SCHEMES.contains(&url.scheme()) {
            return Err(RequirementError::UnsupportedScheme(url.scheme().to_string()));
        }
        Ok(Requirement::Url(RequirementUrl {
            url,
            raw: trimmed.to_string(),
        }))
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Requirement::Url(_))
    }

    pub fn package_name(&self) -> Option<&PackageName> {
        match self {
            Requirement::Named(n) => Some(&n.name),
            Requirement::Url(_) => None,
        }
    }

    /// The basename of the resource a URL requirement points at, used by
    /// the pipeline's Finder-to-Downloader uniqueness guard.
    pub fn url_basename(&self) -> Option<&str> {
        match self {
            Requirement::Url(u) => u.url.path_segments().and_then(Iterator::last),
            Requirement::Named(_) => None,
        }
    }
}

fn split_predicates(input: &str) -> Result<(&str, Option<&str>), RequirementError> {
    match input.find('(') {
        None => Ok((input.trim(), None)),
        Some(open) => {
            let close = input
                .rfind(')')
                .ok_or_else(|| RequirementError::UnbalancedParens(input.to_string()))?;
            if close < open {
                return Err(RequirementError::UnbalancedParens(input.to_string()));
            }
            let name = input[..open].trim();
            let inner = input[open + 1..close].trim();
            Ok((name, Some(inner)))
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Named(n) => {
                if n.predicates.is_empty() {
                    write!(f, "{}", n.name)
                } else {
                    write!(f, "{} ({})", n.name, n.predicates)
                }
            }
            Requirement::Url(u) => write!(f, "{}", u.raw),
        }
    }
}

impl std::hash::Hash for Requirement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_case() {
        assert_eq!(PackageName::new("Foo_Bar.Baz").as_str(), "foo-bar-baz");
        assert_eq!(PackageName::new("Foo--Bar").as_str(), "foo-bar");
    }

    #[test]
    fn parses_bare_name() {
        let req = Requirement::parse("curdling").unwrap();
        match req {
            Requirement::Named(n) => {
                assert_eq!(n.name.as_str(), "curdling");
                assert!(n.predicates.is_empty());
            }
            Requirement::Url(_) => panic!("expected named requirement"),
        }
    }

    #[test]
    fn parses_predicate_requirement() {
        let req = Requirement::parse("sure (== 0.1.2)").unwrap();
        match req {
            Requirement::Named(n) => {
                assert_eq!(n.name.as_str(), "sure");
                assert_eq!(n.predicates.0.len(), 1);
            }
            Requirement::Url(_) => panic!("expected named requirement"),
        }
    }

    #[test]
    fn equality_is_by_normalized_text() {
        let a = Requirement::parse("Foo (==1.0.0)").unwrap();
        let b = Requirement::parse("foo (==1.0.0)").unwrap();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn parses_https_url() {
        let req = Requirement::parse("https://example.com/pkg-1.0.tar.gz").unwrap();
        assert!(req.is_url());
        assert_eq!(req.url_basename(), Some("pkg-1.0.tar.gz"));
    }

    #[test]
    fn parses_git_url() {
        let req = Requirement::parse("git+https://example.com/pkg.git").unwrap();
        assert!(req.is_url());
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = Requirement::parse("ftp://example.com/pkg.tar.gz").unwrap_err();
        assert!(matches!(err, RequirementError::UnsupportedScheme(_)));
    }
}
