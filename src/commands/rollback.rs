// ABOUTME: Rollback command implementation.
// ABOUTME: Re-activates an existing release and runs the post-rollback or on-error hook.

use super::{connector, report, run_hook, with_log_printer};
use hoist::config::Config;
use hoist::deploy::RollbackExecutor;
use hoist::error::Result;
use hoist::guard::OperationGuard;
use hoist::hooks::{HookContext, HookPoint, HookRunner};
use hoist::output::Output;
use std::path::Path;

pub async fn rollback(
    cwd: &Path,
    config: Config,
    release: &str,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let server = &config.server;
    let project = config.project()?;
    let executor = RollbackExecutor::new(connector(&config), OperationGuard::new());

    let result = with_log_printer(&output, async |sink| {
        executor.rollback(server, project, release, sink).await
    })
    .await;

    let hook_runner = HookRunner::new(cwd);
    let context = HookContext::new(project.name.as_str(), server.id().to_string()).finished(
        result.release_id.as_ref().map(ToString::to_string),
        result.success,
    );
    let point = if result.success {
        HookPoint::PostRollback
    } else {
        HookPoint::OnError
    };
    run_hook(&hook_runner, point, &context, &output).await?;

    report(&output, &result, "Rolled back to")
}
