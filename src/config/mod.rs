// ABOUTME: Configuration types and parsing for hoist.yml.
// ABOUTME: Handles YAML parsing, file discovery, and validation of server and project sections.

mod init;
mod project;
mod secret;
mod server;
mod timeouts;

pub use init::init_config;
pub use project::{DeployStrategy, ProjectConfig, Source};
pub use secret::Secret;
pub use server::ServerConfig;
pub use timeouts::Timeouts;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "hoist.yml";
pub const CONFIG_FILENAME_ALT: &str = "hoist.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".hoist/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,

    /// Absent for hosts that are only provisioned or monitored.
    #[serde(default)]
    pub project: Option<ProjectConfig>,

    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        if let Some(project) = &self.project {
            project.validate()?;
        }
        Ok(())
    }

    /// The project section, required by deploy/rollback/releases.
    pub fn project(&self) -> Result<&ProjectConfig> {
        self.project.as_ref().ok_or(Error::NoProject)
    }
}
