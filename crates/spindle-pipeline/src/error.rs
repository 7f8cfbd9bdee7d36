//! The stage-local error kinds raised while a `Job` moves through a pipeline
//! stage, distinct from `spindle-index`'s `IndexError::NotFound` and
//! `spindle-mapping`'s `MappingError::VersionConflict`.

/// Errors raised by an external collaborator (`UpstreamIndex`, `Transport`,
/// `Builder`, `MetadataReader`, `Environment`, `RemoteServer`) while a `Job`
/// moves through a stage. Stored on the failed `Job` and, ultimately, in the
/// per-package error report `Env::retrieve_and_build` returns, so it must be
/// `Clone` to ride the `broadcast` channel alongside the job.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("build failed: {0}")]
    Build(String),
    #[error("failed to read dependency metadata: {0}")]
    Metadata(String),
    #[error("install failed: {0}")]
    Install(String),
    #[error("upload failed: {0}")]
    Upload(String),
}
