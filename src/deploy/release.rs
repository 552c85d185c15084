// ABOUTME: Remote release layout (<root>/releases/<id>, <root>/current) and release id generation.
// ABOUTME: Also reads the layout back: which releases exist and which one `current` points at.

use crate::config::ProjectConfig;
use crate::shell;
use crate::ssh::{self, Remote};
use crate::types::ReleaseId;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Timelike, Utc};
use parking_lot::Mutex;
use serde::Serialize;

pub const RELEASES_DIR: &str = "releases";
pub const CURRENT_LINK: &str = "current";

/// Paths of one project's deploy root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLayout {
    root: String,
}

impl ReleaseLayout {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let trimmed = root.trim_end_matches('/');
        let root = if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        Self { root }
    }

    pub fn for_project(project: &ProjectConfig) -> Self {
        Self::new(project.deploy_root())
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn releases_dir(&self) -> String {
        shell::join(&self.root, RELEASES_DIR)
    }

    pub fn release_path(&self, id: &ReleaseId) -> String {
        shell::join(&self.releases_dir(), id.as_str())
    }

    pub fn current_link(&self) -> String {
        shell::join(&self.root, CURRENT_LINK)
    }

    /// Target written into the `current` symlink. Relative, so the deploy
    /// root can be moved or bind-mounted without breaking the link.
    pub fn link_target(id: &ReleaseId) -> String {
        format!("{}/{}", RELEASES_DIR, id)
    }

    /// Release ids present under `releases/`, oldest first. Entries that are
    /// not release ids are ignored; a missing directory yields an empty list.
    pub async fn list_releases<R: Remote + ?Sized>(
        &self,
        remote: &R,
    ) -> ssh::Result<Vec<ReleaseId>> {
        let output = remote
            .exec(&format!("ls -1 {} 2>/dev/null", shell::quote(&self.releases_dir())))
            .await?;
        if !output.success() {
            return Ok(Vec::new());
        }

        let mut releases: Vec<ReleaseId> = output
            .stdout
            .lines()
            .filter_map(|line| ReleaseId::parse(line).ok())
            .collect();
        releases.sort();
        Ok(releases)
    }

    /// The release `current` resolves to, or `None` if it does not exist.
    pub async fn current_release<R: Remote + ?Sized>(
        &self,
        remote: &R,
    ) -> ssh::Result<Option<ReleaseId>> {
        let output = remote
            .exec(&format!("readlink {}", shell::quote(&self.current_link())))
            .await?;
        if !output.success() {
            return Ok(None);
        }

        let target = output.stdout.trim().trim_end_matches('/');
        let name = target.rsplit('/').next().unwrap_or(target);
        match ReleaseId::parse(name) {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                tracing::warn!("current points at {:?}, which is not a release", target);
                Ok(None)
            }
        }
    }

    pub async fn release_exists<R: Remote + ?Sized>(
        &self,
        remote: &R,
        id: &ReleaseId,
    ) -> ssh::Result<bool> {
        let output = remote
            .exec(&format!("test -d {}", shell::quote(&self.release_path(id))))
            .await?;
        Ok(output.success())
    }
}

/// Snapshot of a project's releases on one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInventory {
    pub releases: Vec<ReleaseId>,
    pub current: Option<ReleaseId>,
}

/// Produces strictly increasing release ids.
///
/// Ids have one-second resolution, so two calls within the same second (or
/// a clock that steps backwards) would collide; in that case the id is
/// bumped to one second past the previous one.
#[derive(Debug, Default)]
pub struct ReleaseIdGenerator {
    last: Mutex<Option<NaiveDateTime>>,
}

impl ReleaseIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> ReleaseId {
        self.next_at(Utc::now())
    }

    pub fn next_at(&self, now: DateTime<Utc>) -> ReleaseId {
        let mut last = self.last.lock();
        let mut candidate = now
            .naive_utc()
            .with_nanosecond(0)
            .unwrap_or_else(|| now.naive_utc());
        if let Some(prev) = *last
            && candidate <= prev
        {
            candidate = prev + TimeDelta::seconds(1);
        }
        *last = Some(candidate);
        ReleaseId::from_datetime(candidate.and_utc())
    }
}
