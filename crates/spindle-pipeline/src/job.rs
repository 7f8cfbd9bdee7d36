//! `Job`: the unit of work that moves between pipeline stages, one typed
//! `Option` field per slot, populated by whichever stage is responsible for
//! it and read by the next.

use spindle_index::Artifact;
use spindle_requirement::Requirement;
use url::Url;

use crate::error::StageError;

#[derive(Debug, Clone)]
pub struct Job {
    pub requirement: Requirement,
    /// `None` for a user-requested root requirement, `Some(parent)` for one
    /// discovered as a dependency of `parent`.
    pub dependency_of: Option<Requirement>,
    pub url: Option<Url>,
    pub source: Option<Artifact>,
    pub wheel: Option<Artifact>,
    pub exception: Option<StageError>,
}

impl Job {
    pub fn new(requirement: Requirement, dependency_of: Option<Requirement>) -> Self {
        Job {
            requirement,
            dependency_of,
            url: None,
            source: None,
            wheel: None,
            exception: None,
        }
    }

    pub fn fail(mut self, err: StageError) -> Self {
        self.exception = Some(err);
        self
    }
}
