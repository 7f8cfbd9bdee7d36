//! The six `Stage` implementations, each a thin adapter from a
//! [`crate::collaborators`] trait object onto the `Job`-shaped [`Stage`]
//! contract.
//!
//! `FinderStage`, `DownloaderStage`, `BuilderStage`, and `DependencerStage`
//! are wired into the feedback pipeline by [`crate::pipeline::wire`].
//! `InstallerStage` and `UploaderStage` are driven directly by `Env::install`
//! and `Env::upload` — they run after reconciliation, over the chosen
//! version set rather than the raw admitted-requirement stream, so they sit
//! outside the five fixed pipeline edges.
//!
//! Each collaborator is stored as a trait object: `Env` doesn't know or care
//! whether it's backed by a real HTTP client or a test stub.

use std::sync::Arc;

use spindle_index::Artifact;

use crate::collaborators::{Builder, Environment, MetadataReader, RemoteServer, Transport, UpstreamIndex};
use crate::error::StageError;
use crate::job::Job;
use crate::service::{ExtraSink, Stage};

pub struct FinderStage {
    index: Arc<dyn UpstreamIndex>,
}

impl FinderStage {
    pub fn new(index: Arc<dyn UpstreamIndex>) -> Self {
        FinderStage { index }
    }
}

#[async_trait::async_trait]
impl Stage for FinderStage {
    fn name(&self) -> &'static str {
        "finder"
    }

    async fn process(&self, mut job: Job, _extra: &ExtraSink) -> Result<Job, (Job, StageError)> {
        match self.index.find(&job.requirement).await {
            Ok(url) => {
                job.url = Some(url);
                Ok(job)
            }
            Err(err) => Err((job, err)),
        }
    }
}

pub struct DownloaderStage {
    transport: Arc<dyn Transport>,
}

impl DownloaderStage {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        DownloaderStage { transport }
    }
}

#[async_trait::async_trait]
impl Stage for DownloaderStage {
    fn name(&self) -> &'static str {
        "downloader"
    }

    async fn process(&self, mut job: Job, _extra: &ExtraSink) -> Result<Job, (Job, StageError)> {
        let Some(url) = job.url.clone() else {
            return Err((
                job.clone(),
                StageError::Transport("downloader received a job with no located URL".to_string()),
            ));
        };
        match self.transport.fetch(&url).await {
            Ok(Artifact::Source(path)) => {
                job.source = Some(Artifact::Source(path));
                Ok(job)
            }
            Ok(Artifact::Wheel(path)) => {
                job.wheel = Some(Artifact::Wheel(path));
                Ok(job)
            }
            Err(err) => Err((job, err)),
        }
    }
}

pub struct BuilderStage {
    builder: Arc<dyn Builder>,
}

impl BuilderStage {
    pub fn new(builder: Arc<dyn Builder>) -> Self {
        BuilderStage { builder }
    }
}

#[async_trait::async_trait]
impl Stage for BuilderStage {
    fn name(&self) -> &'static str {
        "builder"
    }

    async fn process(&self, mut job: Job, _extra: &ExtraSink) -> Result<Job, (Job, StageError)> {
        let Some(source) = job.source.clone() else {
            return Err((
                job.clone(),
                StageError::Build("builder received a job with no downloaded source".to_string()),
            ));
        };
        match self.builder.build(&source).await {
            Ok(wheel) => {
                job.wheel = Some(wheel);
                Ok(job)
            }
            Err(err) => Err((job, err)),
        }
    }
}

pub struct DependencerStage {
    reader: Arc<dyn MetadataReader>,
}

impl DependencerStage {
    pub fn new(reader: Arc<dyn MetadataReader>) -> Self {
        DependencerStage { reader }
    }
}

#[async_trait::async_trait]
impl Stage for DependencerStage {
    fn name(&self) -> &'static str {
        "dependencer"
    }

    async fn process(&self, job: Job, extra: &ExtraSink) -> Result<Job, (Job, StageError)> {
        let Some(wheel) = job.wheel.clone() else {
            return Err((
                job.clone(),
                StageError::Metadata("dependencer received a job with no built wheel".to_string()),
            ));
        };
        match self.reader.dependencies(&wheel).await {
            Ok(children) => {
                for child in children {
                    extra.dependency_found(child, job.requirement.clone());
                }
                Ok(job)
            }
            Err(err) => Err((job, err)),
        }
    }
}

pub struct InstallerStage {
    environment: Arc<dyn Environment>,
}

impl InstallerStage {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        InstallerStage { environment }
    }
}

#[async_trait::async_trait]
impl Stage for InstallerStage {
    fn name(&self) -> &'static str {
        "installer"
    }

    async fn process(&self, job: Job, _extra: &ExtraSink) -> Result<Job, (Job, StageError)> {
        let Some(wheel) = job.wheel.clone() else {
            return Err((
                job.clone(),
                StageError::Install("installer received a job with no built wheel".to_string()),
            ));
        };
        match self.environment.install(&wheel).await {
            Ok(()) => Ok(job),
            Err(err) => Err((job, err)),
        }
    }
}

/// Uploads a built wheel to the server located in `job.url`, reusing that
/// field for the upload destination rather than widening `Job`'s shape —
/// the upload phase only ever runs after the retrieve-and-build phase has
/// already consumed `job.url` for its original purpose.
pub struct UploaderStage {
    server: Arc<dyn RemoteServer>,
}

impl UploaderStage {
    pub fn new(server: Arc<dyn RemoteServer>) -> Self {
        UploaderStage { server }
    }
}

#[async_trait::async_trait]
impl Stage for UploaderStage {
    fn name(&self) -> &'static str {
        "uploader"
    }

    async fn process(&self, job: Job, _extra: &ExtraSink) -> Result<Job, (Job, StageError)> {
        let (Some(wheel), Some(url)) = (job.wheel.clone(), job.url.clone()) else {
            return Err((
                job.clone(),
                StageError::Upload("uploader received a job with no wheel or no destination".to_string()),
            ));
        };
        match self.server.upload(&wheel, &url).await {
            Ok(()) => Ok(job),
            Err(err) => Err((job, err)),
        }
    }
}
