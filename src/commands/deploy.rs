// ABOUTME: Deploy command implementation.
// ABOUTME: Runs hooks around the release deployer and optionally stages a local bundle first.

use super::{connector, report, run_hook, with_log_printer};
use hoist::config::{Config, ProjectConfig};
use hoist::deploy::ReleaseDeployer;
use hoist::error::{Error, Result};
use hoist::guard::OperationGuard;
use hoist::hooks::{HookContext, HookPoint, HookRunner};
use hoist::output::Output;
use std::path::{Path, PathBuf};

pub async fn deploy(
    cwd: &Path,
    config: Config,
    bundle: Option<PathBuf>,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let server = &config.server;
    let mut project: ProjectConfig = config.project()?.clone();
    let deployer = ReleaseDeployer::new(connector(&config), OperationGuard::new());

    let hook_runner = HookRunner::new(cwd);
    let hook_context = HookContext::new(project.name.as_str(), server.id().to_string());

    run_hook(&hook_runner, HookPoint::PreDeploy, &hook_context, &output).await?;

    if let Some(bundle) = bundle {
        if !bundle.is_file() {
            return Err(Error::InvalidConfig(format!(
                "bundle {} does not exist",
                bundle.display()
            )));
        }
        let staged = with_log_printer(&output, async |sink| {
            deployer.stage_bundle(server, &project, &bundle, sink).await
        })
        .await?;
        project.local_bundle_path = Some(staged);
    }

    let result =
        with_log_printer(&output, async |sink| deployer.deploy(server, &project, sink).await)
            .await;

    let finished = hook_context.finished(
        result.release_id.as_ref().map(ToString::to_string),
        result.success,
    );
    let point = if result.success {
        HookPoint::PostDeploy
    } else {
        HookPoint::OnError
    };
    run_hook(&hook_runner, point, &finished, &output).await?;

    report(&output, &result, "Deployed")
}
