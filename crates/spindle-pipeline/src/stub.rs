//! In-memory collaborator stand-ins good enough to drive the pipeline's own
//! test suite and, via `spindle-cli`, a `--offline`-style dry run. None of
//! these touch the network or filesystem beyond what [`spindle_index`]
//! itself already does for a real cache directory.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use spindle_index::Artifact;
use spindle_requirement::Requirement;
use url::Url;

use crate::collaborators::{Builder, Environment, MetadataReader, RemoteServer, Transport, UpstreamIndex};
use crate::error::StageError;

/// Maps a requirement's normalized text to the URL it resolves to.
#[derive(Default)]
pub struct StubIndex {
    locations: HashMap<String, Url>,
}

impl StubIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, requirement: &str, url: &str) -> Self {
        self.locations.insert(requirement.to_string(), Url::parse(url).expect("valid stub URL"));
        self
    }
}

#[async_trait]
impl UpstreamIndex for StubIndex {
    async fn find(&self, requirement: &Requirement) -> Result<Url, StageError> {
        self.locations
            .get(&requirement.to_string())
            .cloned()
            .ok_or_else(|| StageError::NotFound(requirement.to_string()))
    }
}

/// Classifies a fetched URL as a wheel if its path ends in `.whl`,
/// otherwise a source archive — every URL this stub is asked for is
/// considered to "exist".
#[derive(Default)]
pub struct StubTransport;

impl StubTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, url: &Url) -> Result<Artifact, StageError> {
        let basename = url.path_segments().and_then(Iterator::last).unwrap_or_default();
        let path = std::path::PathBuf::from(basename);
        if basename.ends_with(".whl") {
            Ok(Artifact::Wheel(path))
        } else {
            Ok(Artifact::Source(path))
        }
    }
}

/// Always "builds" a source artifact into a wheel with the same basename
/// minus its archive extension, plus `.whl`.
#[derive(Default)]
pub struct StubBuilder;

impl StubBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Builder for StubBuilder {
    async fn build(&self, source: &Artifact) -> Result<Artifact, StageError> {
        let filename = source.path().file_name().and_then(std::ffi::OsStr::to_str).unwrap_or("package");
        let stem = strip_archive_suffix(filename);
        Ok(Artifact::Wheel(std::path::PathBuf::from(format!("{stem}.whl"))))
    }
}

/// Strips a source distribution's archive suffix, the way a real build
/// backend would derive a wheel's base name from an sdist's filename
/// (`pkg-1.0.tar.gz` -> `pkg-1.0`, not the single-extension `pkg-1.0.tar`
/// that `Path::file_stem` alone would leave behind).
fn strip_archive_suffix(filename: &str) -> &str {
    for suffix in [".tar.gz", ".tar.bz2", ".tar.xz", ".zip", ".tar"] {
        if let Some(stripped) = filename.strip_suffix(suffix) {
            return stripped;
        }
    }
    filename
}

/// Maps a wheel's path (as a string) to the list of requirements it depends
/// on, configured up front — models a fixed dependency graph for tests.
#[derive(Default)]
pub struct StubMetadataReader {
    dependencies: HashMap<String, Vec<Requirement>>,
}

impl StubMetadataReader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, wheel_path: &str, deps: Vec<Requirement>) -> Self {
        self.dependencies.insert(wheel_path.to_string(), deps);
        self
    }
}

#[async_trait]
impl MetadataReader for StubMetadataReader {
    async fn dependencies(&self, wheel: &Artifact) -> Result<Vec<Requirement>, StageError> {
        let key = wheel.path().to_string_lossy().to_string();
        Ok(self.dependencies.get(&key).cloned().unwrap_or_default())
    }
}

/// Records every wheel path it was asked to install, in call order.
#[derive(Default)]
pub struct StubEnvironment {
    installed: Mutex<Vec<std::path::PathBuf>>,
}

impl StubEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(&self) -> Vec<std::path::PathBuf> {
        self.installed.lock().expect("stub environment lock poisoned").clone()
    }
}

#[async_trait]
impl Environment for StubEnvironment {
    async fn install(&self, wheel: &Artifact) -> Result<(), StageError> {
        self.installed
            .lock()
            .expect("stub environment lock poisoned")
            .push(wheel.path().to_path_buf());
        Ok(())
    }
}

/// Records every `(wheel, server)` pair it was asked to upload.
#[derive(Default)]
pub struct StubRemoteServer {
    uploaded: Mutex<Vec<(std::path::PathBuf, Url)>>,
}

impl StubRemoteServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded(&self) -> Vec<(std::path::PathBuf, Url)> {
        self.uploaded.lock().expect("stub remote server lock poisoned").clone()
    }
}

#[async_trait]
impl RemoteServer for StubRemoteServer {
    async fn upload(&self, wheel: &Artifact, server: &Url) -> Result<(), StageError> {
        self.uploaded
            .lock()
            .expect("stub remote server lock poisoned")
            .push((wheel.path().to_path_buf(), server.clone()));
        Ok(())
    }
}
