// ABOUTME: Project description: what to deploy, where, and how to build and start it.
// ABOUTME: Also defines the deploy strategy hint that selects install/restart commands.

use crate::error::{Error, Result};
use crate::types::{ProjectId, ProjectName};
use serde::{Deserialize, Serialize};

/// How the project runs once a release is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStrategy {
    /// A process supervisor (pm2) runs the app from `current`.
    #[default]
    Supervisor,
    /// `docker compose` inside `current`.
    Compose,
    /// An image built from `current` and run as a single container.
    Image,
}

impl std::fmt::Display for DeployStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployStrategy::Supervisor => write!(f, "supervisor"),
            DeployStrategy::Compose => write!(f, "compose"),
            DeployStrategy::Image => write!(f, "image"),
        }
    }
}

/// Where a release's source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source<'a> {
    Git { url: &'a str, branch: &'a str },
    /// A tarball already present on the remote host.
    Bundle { path: &'a str },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Stable identifier for the operation guard. Defaults to the name.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(deserialize_with = "deserialize_project_name")]
    pub name: ProjectName,

    #[serde(default)]
    pub repo_url: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Absolute directory holding `releases/` and `current`.
    pub deploy_path: String,

    #[serde(default)]
    pub build_command: Option<String>,

    #[serde(default)]
    pub start_command: Option<String>,

    #[serde(default)]
    pub strategy: DeployStrategy,

    /// Remote path of a pre-uploaded `.tar.gz` bundle. Takes precedence over `repo_url`.
    #[serde(default)]
    pub local_bundle_path: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl ProjectConfig {
    pub fn new(
        name: ProjectName,
        repo_url: impl Into<String>,
        deploy_path: impl Into<String>,
    ) -> Self {
        ProjectConfig {
            id: None,
            name,
            repo_url: Some(repo_url.into()),
            branch: default_branch(),
            deploy_path: deploy_path.into(),
            build_command: None,
            start_command: None,
            strategy: DeployStrategy::default(),
            local_bundle_path: None,
        }
    }

    pub fn id(&self) -> ProjectId {
        ProjectId::new(self.id.clone().unwrap_or_else(|| self.name.to_string()))
    }

    /// The source to materialize, or `None` if neither a bundle nor a repository is set.
    pub fn source(&self) -> Option<Source<'_>> {
        if let Some(path) = self.local_bundle_path.as_deref() {
            return Some(Source::Bundle { path });
        }
        self.repo_url.as_deref().map(|url| Source::Git {
            url,
            branch: &self.branch,
        })
    }

    /// Deploy path without trailing slashes.
    pub fn deploy_root(&self) -> &str {
        match self.deploy_path.trim_end_matches('/') {
            "" => "/",
            root => root,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.deploy_path.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "deploy_path must be absolute, got {:?}",
                self.deploy_path
            )));
        }
        if self.deploy_root() == "/" {
            return Err(Error::InvalidConfig(
                "deploy_path cannot be the filesystem root".to_string(),
            ));
        }
        if self.deploy_path.split('/').any(|part| part == "..") {
            return Err(Error::InvalidConfig(
                "deploy_path cannot contain '..'".to_string(),
            ));
        }
        if self.source().is_none() {
            return Err(Error::InvalidConfig(format!(
                "project {} needs repo_url or local_bundle_path",
                self.name
            )));
        }
        if self.branch.trim().is_empty() {
            return Err(Error::InvalidConfig("branch cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn deserialize_project_name<'de, D>(deserializer: D) -> std::result::Result<ProjectName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ProjectName::new(&s).map_err(serde::de::Error::custom)
}
