// ABOUTME: Release deployer: builds a new release in its own directory and atomically promotes it.
// ABOUTME: Failures before activation leave `current` exactly as it was.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;

use super::release::{ReleaseIdGenerator, ReleaseInventory, ReleaseLayout};
use super::result::DeployResult;
use super::{DeployError, close_remote, plan};
use crate::config::{ProjectConfig, ServerConfig};
use crate::diagnostics::Diagnostics;
use crate::guard::OperationGuard;
use crate::logs::LogSink;
use crate::shell;
use crate::ssh::{self, Connector, Remote};
use crate::step::StepRunner;
use crate::types::{ProjectId, ReleaseId};

/// Directory under the deploy root where uploaded bundles are staged.
pub const BUNDLES_DIR: &str = ".bundles";

/// Drives the release protocol for one project at a time per project id.
pub struct ReleaseDeployer<C> {
    connector: C,
    guard: OperationGuard<ProjectId>,
    ids: ReleaseIdGenerator,
}

impl<C: std::fmt::Debug> std::fmt::Debug for ReleaseDeployer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseDeployer")
            .field("connector", &self.connector)
            .field("guard", &self.guard)
            .finish()
    }
}

impl<C: Connector> ReleaseDeployer<C> {
    pub fn new(connector: C, guard: OperationGuard<ProjectId>) -> Self {
        Self {
            connector,
            guard,
            ids: ReleaseIdGenerator::new(),
        }
    }

    pub fn guard(&self) -> &OperationGuard<ProjectId> {
        &self.guard
    }

    /// Deploy a new release of `project` to `server`.
    ///
    /// Never returns an error: every failure, including rejection because
    /// the project is busy, is reported in the result.
    pub async fn deploy(
        &self,
        server: &ServerConfig,
        project: &ProjectConfig,
        sink: &LogSink,
    ) -> DeployResult {
        let started = Instant::now();

        let _ticket = match self.guard.try_acquire(project.id()) {
            Ok(ticket) => ticket,
            Err(e) => {
                let e = DeployError::Busy(e);
                tracing::warn!(project = %project.name, "deploy rejected: {}", e);
                sink.info(format!("Deployment rejected: {e}")).await;
                return DeployResult::failed(None, started.elapsed(), &e, Vec::new());
            }
        };

        let release_id = self.ids.next();
        let mut diag = Diagnostics::default();

        tracing::info!(
            project = %project.name,
            release = %release_id,
            host = %server.host,
            "deploy started"
        );
        sink.info(format!(
            "Deploying {} (release {}) to {}",
            project.name, release_id, server.host
        ))
        .await;

        match self
            .run(server, project, &release_id, sink, &mut diag)
            .await
        {
            Ok(commit_hash) => {
                let result = DeployResult::succeeded(
                    release_id,
                    commit_hash,
                    started.elapsed(),
                    diag.into_messages(),
                );
                tracing::info!(
                    project = %project.name,
                    duration_ms = result.duration_ms,
                    "deploy finished"
                );
                let secs = result.duration().as_secs_f64();
                sink.info(format!("Deployed release in {secs:.1}s")).await;
                result
            }
            Err(e) => {
                tracing::error!(
                    project = %project.name,
                    release = %release_id,
                    "deploy failed: {}",
                    e
                );
                sink.info(format!("Deployment failed: {e}")).await;
                DeployResult::failed(
                    Some(release_id),
                    started.elapsed(),
                    &e,
                    diag.into_messages(),
                )
            }
        }
    }

    async fn run(
        &self,
        server: &ServerConfig,
        project: &ProjectConfig,
        release_id: &ReleaseId,
        sink: &LogSink,
        diag: &mut Diagnostics,
    ) -> Result<Option<String>, DeployError> {
        project
            .validate()
            .map_err(|e| DeployError::InvalidProject(e.to_string()))?;

        sink.info(format!(
            "Connecting to {}@{}:{}",
            server.username, server.host, server.port
        ))
        .await;
        let remote = self
            .connector
            .connect(server)
            .await
            .map_err(DeployError::Connection)?;

        let layout = ReleaseLayout::for_project(project);
        let outcome = release(&remote, project, &layout, release_id, sink, diag).await;
        close_remote(&remote, diag).await;
        outcome
    }

    /// Upload a local bundle into the project's staging directory and
    /// return its remote path, for use as `local_bundle_path`.
    ///
    /// The file is named after the upload time. That name does not reserve
    /// a release id; the following deploy picks its own.
    pub async fn stage_bundle(
        &self,
        server: &ServerConfig,
        project: &ProjectConfig,
        bundle: &Path,
        sink: &LogSink,
    ) -> Result<String, DeployError> {
        let _ticket = self.guard.try_acquire(project.id())?;

        let layout = ReleaseLayout::for_project(project);
        let staging_dir = shell::join(layout.root(), BUNDLES_DIR);
        let uploaded_at = ReleaseId::from_datetime(Utc::now());
        let remote_path = shell::join(&staging_dir, &format!("{uploaded_at}.tar.gz"));

        let remote = self
            .connector
            .connect(server)
            .await
            .map_err(DeployError::Connection)?;
        let mut diag = Diagnostics::default();

        let uploaded = upload_bundle(&remote, &staging_dir, &remote_path, bundle, sink)
            .await
            .map(|()| remote_path);
        close_remote(&remote, &mut diag).await;
        uploaded
    }

    /// List the releases on the server and the one `current` points at.
    pub async fn inventory(
        &self,
        server: &ServerConfig,
        project: &ProjectConfig,
    ) -> Result<ReleaseInventory, DeployError> {
        let layout = ReleaseLayout::for_project(project);
        let remote = self
            .connector
            .connect(server)
            .await
            .map_err(DeployError::Connection)?;
        let mut diag = Diagnostics::default();

        let inventory = read_inventory(&remote, &layout).await;
        close_remote(&remote, &mut diag).await;
        inventory
    }
}

/// Everything between connect and close: materialize, build, cut over, restart.
async fn release<R: Remote + ?Sized>(
    remote: &R,
    project: &ProjectConfig,
    layout: &ReleaseLayout,
    release_id: &ReleaseId,
    sink: &LogSink,
    diag: &mut Diagnostics,
) -> Result<Option<String>, DeployError> {
    let runner = StepRunner::new(remote, sink);
    let release_path = layout.release_path(release_id);

    runner.run(&plan::prepare(&release_path), diag).await?;
    runner.run(&plan::fetch(project, &release_path)?, diag).await?;
    if let Some(step) = plan::install(project, &release_path) {
        runner.run(&step, diag).await?;
    }
    if let Some(step) = plan::build(project, &release_path) {
        runner.run(&step, diag).await?;
    }
    if let Some(step) = plan::image_build(project, &release_path, release_id) {
        runner.run(&step, diag).await?;
    }

    // Cutover: nothing above this line touches `current`.
    runner.run(&plan::activate(layout, release_id), diag).await?;
    runner.run(&plan::restart(project, layout, release_id), diag).await?;

    Ok(resolve_commit(remote, layout).await)
}

async fn upload_bundle<R: Remote + ?Sized>(
    remote: &R,
    staging_dir: &str,
    remote_path: &str,
    bundle: &Path,
    sink: &LogSink,
) -> Result<(), DeployError> {
    let mkdir = remote
        .exec(&format!("mkdir -p {}", shell::quote(staging_dir)))
        .await?;
    if !mkdir.success() {
        return Err(DeployError::Remote(ssh::Error::UploadFailed {
            path: staging_dir.to_string(),
            reason: mkdir.stderr.trim().to_string(),
        }));
    }
    sink.info(format!("Uploading {} to {}", bundle.display(), remote_path))
        .await;
    remote.upload_file(bundle, remote_path).await?;
    Ok(())
}

async fn read_inventory<R: Remote + ?Sized>(
    remote: &R,
    layout: &ReleaseLayout,
) -> Result<ReleaseInventory, DeployError> {
    Ok(ReleaseInventory {
        releases: layout.list_releases(remote).await?,
        current: layout.current_release(remote).await?,
    })
}

/// Best-effort: bundles and non-git sources have no commit.
async fn resolve_commit<R: Remote + ?Sized>(remote: &R, layout: &ReleaseLayout) -> Option<String> {
    match remote.exec(&plan::commit_probe(layout)).await {
        Ok(output) if output.success() => plan::parse_commit(&output.stdout),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("commit hash unavailable: {}", e);
            None
        }
    }
}
