// ABOUTME: Server provisioning: detect the host, install a container engine and git, apply a firewall baseline.
// ABOUTME: Idempotent; only connection loss, detection failure, or an unsupported OS fail a run.

mod detection;
mod plan;

pub use detection::{HostInfo, OS_RELEASE_PATH, OsFamily, OsRelease, Privilege, detect_host};
pub use plan::{FirewallPlan, firewall_plan, install_steps};

use std::time::Instant;

use crate::config::ServerConfig;
use crate::deploy::{SetupResult, close_remote};
use crate::diagnostics::{Diagnostics, Warning};
use crate::guard::{GuardError, OperationGuard};
use crate::logs::LogSink;
use crate::ssh::{self, Connector, Remote};
use crate::step::{StepError, StepRunner};
use crate::types::ServerId;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Busy(#[from] GuardError),

    #[error("connection failed: {0}")]
    Connection(#[source] ssh::Error),

    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    #[error("host detection failed: {0}")]
    Detection(String),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("remote command failed: {0}")]
    Remote(#[from] ssh::Error),
}

/// Prepares bare servers for deployment, one run per server at a time.
pub struct Provisioner<C> {
    connector: C,
    guard: OperationGuard<ServerId>,
}

impl<C: Connector> Provisioner<C> {
    pub fn new(connector: C, guard: OperationGuard<ServerId>) -> Self {
        Self { connector, guard }
    }

    pub fn guard(&self) -> &OperationGuard<ServerId> {
        &self.guard
    }

    /// Provision `server`. Every failure is reported in the result.
    pub async fn setup(&self, server: &ServerConfig, sink: &LogSink) -> SetupResult {
        let started = Instant::now();

        let _ticket = match self.guard.try_acquire(server.id()) {
            Ok(ticket) => ticket,
            Err(e) => {
                let e = ProvisionError::Busy(e);
                tracing::warn!(host = %server.host, "setup rejected: {}", e);
                sink.info(format!("Setup rejected: {e}")).await;
                return SetupResult::failed(None, started.elapsed(), &e, Vec::new());
            }
        };

        let mut diag = Diagnostics::default();
        let mut os = None;
        tracing::info!(host = %server.host, "setup started");

        match self.run(server, sink, &mut os, &mut diag).await {
            Ok(()) => {
                let os = os.unwrap_or_else(|| "unknown".to_string());
                sink.info(format!("Server {} is ready", server.host)).await;
                SetupResult::succeeded(os, started.elapsed(), diag.into_messages())
            }
            Err(e) => {
                tracing::error!(host = %server.host, "setup failed: {}", e);
                sink.info(format!("Setup failed: {e}")).await;
                SetupResult::failed(os, started.elapsed(), &e, diag.into_messages())
            }
        }
    }

    async fn run(
        &self,
        server: &ServerConfig,
        sink: &LogSink,
        os: &mut Option<String>,
        diag: &mut Diagnostics,
    ) -> Result<(), ProvisionError> {
        sink.info(format!(
            "Connecting to {}@{}:{}",
            server.username, server.host, server.port
        ))
        .await;
        let remote = self
            .connector
            .connect(server)
            .await
            .map_err(ProvisionError::Connection)?;

        let outcome = provision(&remote, server, sink, os, diag).await;
        close_remote(&remote, diag).await;
        outcome
    }
}

async fn provision<R: Remote + ?Sized>(
    remote: &R,
    server: &ServerConfig,
    sink: &LogSink,
    os: &mut Option<String>,
    diag: &mut Diagnostics,
) -> Result<(), ProvisionError> {
    let host = detect_host(remote).await?;
    *os = Some(host.os.display_name());
    sink.info(format!(
        "Detected {} ({}), running as {}",
        host.os.display_name(),
        host.family,
        if host.privilege == Privilege::Root { "root" } else { "non-root via sudo" }
    ))
    .await;

    if let OsFamily::Unsupported(id) = &host.family {
        return Err(ProvisionError::UnsupportedOs(id.clone()));
    }

    let runner = StepRunner::new(remote, sink);
    runner
        .run_all(
            &install_steps(&host.family, host.privilege, &server.username),
            diag,
        )
        .await?;

    let Some(firewall) = firewall_plan(&host.family, host.privilege, server.port) else {
        sink.info(format!("No managed firewall for {}, skipping", host.family))
            .await;
        return Ok(());
    };

    runner.run_all(&firewall.setup, diag).await?;
    if !remote.exec(&firewall.probe).await?.success() {
        diag.warn(Warning::step_tolerated(format!(
            "{} is not available, firewall not configured",
            firewall.tool
        )));
        sink.info(format!("{} not available, skipping firewall", firewall.tool))
            .await;
        return Ok(());
    }
    runner.run_all(&firewall.rules, diag).await?;
    Ok(())
}
