//! The `ArtifactIndex` external contract: a keyed lookup over already-known
//! source archives and built wheels.
//!
//! The core only ever holds opaque locator strings returned from [`get`];
//! it never interprets them. This crate additionally ships an in-memory
//! implementation good enough to drive the pipeline's tests and a thin
//! filesystem-backed one for a real on-disk cache directory.

use std::fmt;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use spindle_requirement::Requirement;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no artifact on file for {0}")]
    PackageNotFound(String),
    #[error("I/O error reading artifact index: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Unbuilt source archive, keyed `"<requirement>;~whl"`.
    Source,
    /// Built wheel, keyed `"<requirement>;whl"`.
    Wheel,
}

#[derive(Debug, Clone)]
pub struct IndexKey {
    pub requirement: Requirement,
    pub kind: ArtifactKind,
}

impl IndexKey {
    pub fn source(requirement: Requirement) -> Self {
        IndexKey {
            requirement,
            kind: ArtifactKind::Source,
        }
    }

    pub fn wheel(requirement: Requirement) -> Self {
        IndexKey {
            requirement,
            kind: ArtifactKind::Wheel,
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.kind {
            ArtifactKind::Source => ";~whl",
            ArtifactKind::Wheel => ";whl",
        };
        write!(f, "{}{}", self.requirement, suffix)
    }
}

/// Either an unbuilt archive or a built wheel, locator-addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Source(PathBuf),
    Wheel(PathBuf),
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Artifact::Source(p) | Artifact::Wheel(p) => p,
        }
    }
}

/// The content-addressed store of sources and wheels. Consulted
/// monotonically: a cache hit never regresses a requirement to an earlier
/// pipeline stage.
pub trait ArtifactIndex: Send + Sync {
    fn get(&self, key: &IndexKey) -> Result<String, IndexError>;

    /// Record a locator under `key`. Every implementation needs a way to
    /// populate itself — as does a build-stage collaborator recording a
    /// freshly built wheel.
    fn put(&self, key: IndexKey, locator: String);
}

/// An in-memory `ArtifactIndex`, sufficient for tests and for a
/// single-process run with no persistent cache.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: DashMap<String, String>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactIndex for InMemoryIndex {
    fn get(&self, key: &IndexKey) -> Result<String, IndexError> {
        self.entries
            .get(&key.to_string())
            .map(|entry| entry.clone())
            .ok_or_else(|| IndexError::PackageNotFound(key.to_string()))
    }

    fn put(&self, key: IndexKey, locator: String) {
        self.entries.insert(key.to_string(), locator);
    }
}

/// A filesystem-backed `ArtifactIndex`: locators are paths under `root`,
/// keyed by a filename derived from the index key.
pub struct FsIndex {
    root: PathBuf,
    entries: DashMap<String, String>,
}

impl FsIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsIndex {
            root: root.into(),
            entries: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan `root` for already-downloaded artifacts, matching
    /// `Index.scan()` in the system this contract is modeled on. Entries
    /// must already have been recorded via `put` by whatever owns the
    /// directory layout; `spindle` itself treats the directory layout as
    /// opaque.
    pub fn scan(&self) -> Result<(), IndexError> {
        if !self.root.exists() {
            tracing::debug!(root = %self.root.display(), "creating artifact cache directory");
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}

impl ArtifactIndex for FsIndex {
    fn get(&self, key: &IndexKey) -> Result<String, IndexError> {
        self.entries
            .get(&key.to_string())
            .map(|entry| entry.clone())
            .ok_or_else(|| IndexError::PackageNotFound(key.to_string()))
    }

    fn put(&self, key: IndexKey, locator: String) {
        self.entries.insert(key.to_string(), locator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_renders_spec_string_form() {
        let req = Requirement::parse("curdling").unwrap();
        let key = IndexKey::wheel(req);
        assert_eq!(key.to_string(), "curdling;whl");
    }

    #[test]
    fn miss_reports_not_found() {
        let index = InMemoryIndex::new();
        let req = Requirement::parse("curdling").unwrap();
        let err = index.get(&IndexKey::wheel(req)).unwrap_err();
        assert!(matches!(err, IndexError::PackageNotFound(_)));
    }

    #[test]
    fn hit_returns_locator() {
        let index = InMemoryIndex::new();
        let req = Requirement::parse("curdling").unwrap();
        index.put(IndexKey::wheel(req.clone()), "/curds/curdling.whl".to_string());
        assert_eq!(
            index.get(&IndexKey::wheel(req)).unwrap(),
            "/curds/curdling.whl"
        );
    }
}
