// ABOUTME: Application-wide error types for hoist.
// ABOUTME: Uses thiserror; module errors convert in with #[from].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("configuration has no project section")]
    NoProject,

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("{0}")]
    Deploy(#[from] crate::deploy::DeployError),

    #[error("{0}")]
    Pulse(#[from] crate::pulse::PulseError),

    #[error("hook failed: {0}")]
    Hook(String),

    /// A pipeline finished with a failure result; the message is passed through verbatim.
    #[error("{0}")]
    OperationFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
