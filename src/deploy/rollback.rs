// ABOUTME: Rollback executor: re-promotes an existing release without fetching or building.
// ABOUTME: Verifies the release directory exists before touching `current`.

use std::time::Instant;

use super::release::ReleaseLayout;
use super::result::DeployResult;
use super::{DeployError, close_remote, plan};
use crate::config::{ProjectConfig, ServerConfig};
use crate::diagnostics::Diagnostics;
use crate::guard::OperationGuard;
use crate::logs::LogSink;
use crate::ssh::{Connector, Remote};
use crate::step::StepRunner;
use crate::types::{ProjectId, ReleaseId};

/// Repoints `current` at an earlier release and restarts the application.
///
/// Shares the project guard with `ReleaseDeployer` so a rollback and a
/// deploy of the same project never race on `current`.
pub struct RollbackExecutor<C> {
    connector: C,
    guard: OperationGuard<ProjectId>,
}

impl<C: Connector> RollbackExecutor<C> {
    pub fn new(connector: C, guard: OperationGuard<ProjectId>) -> Self {
        Self { connector, guard }
    }

    /// Roll `project` back to `release`.
    ///
    /// The result is keyed by the target release id. No commit hash is
    /// resolved.
    pub async fn rollback(
        &self,
        server: &ServerConfig,
        project: &ProjectConfig,
        release: &str,
        sink: &LogSink,
    ) -> DeployResult {
        let started = Instant::now();

        let release_id = match ReleaseId::parse(release) {
            Ok(id) => id,
            Err(e) => {
                let e = DeployError::from(e);
                sink.info(format!("Rollback rejected: {e}")).await;
                return DeployResult::failed(None, started.elapsed(), &e, Vec::new());
            }
        };

        let _ticket = match self.guard.try_acquire(project.id()) {
            Ok(ticket) => ticket,
            Err(e) => {
                let e = DeployError::Busy(e);
                tracing::warn!(project = %project.name, "rollback rejected: {}", e);
                sink.info(format!("Rollback rejected: {e}")).await;
                return DeployResult::failed(Some(release_id), started.elapsed(), &e, Vec::new());
            }
        };

        let mut diag = Diagnostics::default();
        tracing::info!(project = %project.name, release = %release_id, "rollback started");
        sink.info(format!(
            "Rolling back {} to release {} on {}",
            project.name, release_id, server.host
        ))
        .await;

        match self.run(server, project, &release_id, sink, &mut diag).await {
            Ok(()) => {
                sink.info(format!("Release {release_id} is live")).await;
                DeployResult::succeeded(release_id, None, started.elapsed(), diag.into_messages())
            }
            Err(e) => {
                tracing::error!(
                    project = %project.name,
                    release = %release_id,
                    "rollback failed: {}",
                    e
                );
                sink.info(format!("Rollback failed: {e}")).await;
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
    ) -> Result<(), DeployError> {
        project
            .validate()
            .map_err(|e| DeployError::InvalidProject(e.to_string()))?;

        let remote = self
            .connector
            .connect(server)
            .await
            .map_err(DeployError::Connection)?;

        let layout = ReleaseLayout::for_project(project);
        let outcome = repromote(&remote, project, &layout, release_id, sink, diag).await;
        close_remote(&remote, diag).await;
        outcome
    }
}

async fn repromote<R: Remote + ?Sized>(
    remote: &R,
    project: &ProjectConfig,
    layout: &ReleaseLayout,
    release_id: &ReleaseId,
    sink: &LogSink,
    diag: &mut Diagnostics,
) -> Result<(), DeployError> {
    if !layout.release_exists(remote, release_id).await? {
        return Err(DeployError::ReleaseNotFound {
            release: release_id.clone(),
            path: layout.release_path(release_id),
        });
    }

    let runner = StepRunner::new(remote, sink);
    runner.run(&plan::activate(layout, release_id), diag).await?;
    runner.run(&plan::restart(project, layout, release_id), diag).await?;
    Ok(())
}
