// ABOUTME: Error types for deploy and rollback pipelines.
// ABOUTME: Converted into a failed DeployResult at the pipeline boundary.

use crate::guard::GuardError;
use crate::ssh;
use crate::step::StepError;
use crate::types::{ReleaseId, ReleaseIdError};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Another operation holds the project.
    #[error(transparent)]
    Busy(#[from] GuardError),

    #[error("invalid project configuration: {0}")]
    InvalidProject(String),

    #[error("invalid release id: {0}")]
    InvalidReleaseId(#[from] ReleaseIdError),

    #[error("connection failed: {0}")]
    Connection(#[source] ssh::Error),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("release {release} not found at {path}")]
    ReleaseNotFound { release: ReleaseId, path: String },

    #[error("remote command failed: {0}")]
    Remote(#[from] ssh::Error),
}
