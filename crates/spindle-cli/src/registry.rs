//! `ManifestRegistry`: a TOML-file-backed stand-in for the upstream HTTP
//! index, transport, builder, and metadata-reader collaborators, which are
//! out of core scope (see `DESIGN.md`); `spindle` ships this offline one so
//! the CLI has something to drive end to end without a network.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use spindle_index::Artifact;
use spindle_pipeline::{Builder, MetadataReader, StageError, Transport, UpstreamIndex};
use spindle_requirement::{PackageName, Requirement};

#[derive(Debug, Deserialize)]
struct ManifestFile {
    packages: HashMap<String, ManifestPackage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestPackage {
    version: String,
    #[serde(default)]
    depends: Vec<String>,
}

pub struct ManifestRegistry {
    packages: HashMap<String, ManifestPackage>,
}

impl ManifestRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs_err::read_to_string(path).with_context(|| format!("reading registry manifest {}", path.display()))?;
        let file: ManifestFile = toml::from_str(&raw).with_context(|| format!("invalid registry manifest {}", path.display()))?;
        Ok(ManifestRegistry { packages: file.packages })
    }

    /// An empty registry: every lookup is a `NotFound`, useful when the CLI
    /// is run with only `--index`/`--spindle-index` URLs and no local
    /// manifest (those are accepted for compatibility with the CLI surface
    /// but a real HTTP-backed `UpstreamIndex` is out of scope here).
    pub fn empty() -> Self {
        ManifestRegistry { packages: HashMap::new() }
    }

    fn entry(&self, name: &PackageName) -> Option<&ManifestPackage> {
        self.packages.get(name.as_str())
    }

    fn basename(name: &str, version: &str) -> String {
        format!("{name}-{version}.tar.gz")
    }
}

#[async_trait]
impl UpstreamIndex for ManifestRegistry {
    async fn find(&self, requirement: &Requirement) -> Result<Url, StageError> {
        let Some(name) = requirement.package_name() else {
            return Err(StageError::NotFound(requirement.to_string()));
        };
        let entry = self
            .entry(name)
            .ok_or_else(|| StageError::NotFound(requirement.to_string()))?;
        let basename = Self::basename(name.as_str(), &entry.version);
        Url::parse(&format!("spindle-registry://local/{basename}"))
            .map_err(|e| StageError::Transport(format!("malformed synthetic URL for {name}: {e}")))
    }
}

#[async_trait]
impl Transport for ManifestRegistry {
    async fn fetch(&self, url: &Url) -> Result<Artifact, StageError> {
        let basename = url
            .path_segments()
            .and_then(Iterator::last)
            .ok_or_else(|| StageError::Transport(format!("no basename in {url}")))?;
        Ok(Artifact::Source(std::path::PathBuf::from(basename)))
    }
}

#[async_trait]
impl Builder for ManifestRegistry {
    async fn build(&self, source: &Artifact) -> Result<Artifact, StageError> {
        let filename = source
            .path()
            .file_name()
            .and_then(std::ffi::OsStr::to_str)
            .ok_or_else(|| StageError::Build("source path has no filename".to_string()))?;
        let stem = strip_archive_suffix(filename);
        Ok(Artifact::Wheel(std::path::PathBuf::from(format!("{stem}.whl"))))
    }
}

#[async_trait]
impl MetadataReader for ManifestRegistry {
    async fn dependencies(&self, wheel: &Artifact) -> Result<Vec<Requirement>, StageError> {
        let stem = wheel
            .path()
            .file_stem()
            .and_then(std::ffi::OsStr::to_str)
            .ok_or_else(|| StageError::Metadata("wheel path has no filename".to_string()))?;
        // PEP 427-style "{name}-{version}": everything before the first
        // hyphen is the name. Manifest package names in this registry are
        // taken to be hyphen-free, matching the fixtures this CLI ships.
        let name = stem.split('-').next().unwrap_or(stem);
        let Some(entry) = self.packages.get(name) else {
            return Ok(Vec::new());
        };
        entry
            .depends
            .iter()
            .map(|spec| Requirement::parse(spec).map_err(|e| StageError::Metadata(format!("invalid dependency {spec:?} declared by {name}: {e}"))))
            .collect()
    }
}

fn strip_archive_suffix(filename: &str) -> &str {
    for suffix in [".tar.gz", ".tar.bz2", ".tar.xz", ".zip", ".tar"] {
        if let Some(stripped) = filename.strip_suffix(suffix) {
            return stripped;
        }
    }
    filename
}
