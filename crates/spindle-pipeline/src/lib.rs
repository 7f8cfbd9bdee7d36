//! The concurrent retrieve-and-build pipeline: a generic worker-pool
//! [`service::Service`] wrapping each pipeline [`service::Stage`], wired by
//! [`pipeline::wire`] into a fixed Finder → Downloader → Builder →
//! Dependencer topology with a feedback edge back to the head, driven end
//! to end by [`env::Env`].

pub mod collaborators;
pub mod env;
mod error;
mod guard;
mod job;
pub mod pipeline;
pub mod service;
pub mod stages;
pub mod stub;

pub use collaborators::{Builder, Environment, MetadataReader, RemoteServer, Transport, UpstreamIndex};
pub use env::{Env, Failure, InstallPlan, InstallTarget, Progress, Report, RetrieveReport, DEFAULT_BLACKLIST};
pub use error::StageError;
pub use job::Job;
pub use service::{DependencyFound, ExtraSink, Service, Stage};
