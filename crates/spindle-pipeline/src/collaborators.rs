//! External collaborator contracts: thin async traits the six pipeline
//! stages drive. `spindle` supplies an in-memory default for each (see
//! [`crate::stub`]) sufficient for tests; a production deployment wires in
//! HTTP- and subprocess-backed implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use spindle_index::Artifact;
use spindle_requirement::{PackageName, Requirement};
use url::Url;

use crate::error::StageError;

/// Locates a requirement across the configured upstream indexes.
#[async_trait]
pub trait UpstreamIndex: Send + Sync {
    async fn find(&self, requirement: &Requirement) -> Result<Url, StageError>;

    /// Packages this index could not satisfy and which server should
    /// receive them on the upload phase.
    fn servers_to_update(&self) -> HashMap<Url, Vec<PackageName>> {
        HashMap::new()
    }
}

/// Fetches the resource at a located URL, classifying it as source or wheel.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Artifact, StageError>;
}

/// Builds a source artifact into a wheel.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, source: &Artifact) -> Result<Artifact, StageError>;
}

/// Reads the transitive dependency list out of a built wheel's metadata.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    async fn dependencies(&self, wheel: &Artifact) -> Result<Vec<Requirement>, StageError>;
}

/// Installs a wheel into the target environment.
#[async_trait]
pub trait Environment: Send + Sync {
    async fn install(&self, wheel: &Artifact) -> Result<(), StageError>;
}

/// Republishes a built wheel to a private index.
#[async_trait]
pub trait RemoteServer: Send + Sync {
    async fn upload(&self, wheel: &Artifact, server: &Url) -> Result<(), StageError>;
}
