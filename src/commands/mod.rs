// ABOUTME: Command handlers for the hoist CLI.
// ABOUTME: Wires config, pipelines, hooks, and the log printer together for each subcommand.

mod deploy;
mod inspect;
mod rollback;
mod setup;

pub use deploy::deploy;
pub use inspect::{pulse, releases};
pub use rollback::rollback;
pub use setup::setup;

use hoist::config::Config;
use hoist::deploy::DeployResult;
use hoist::error::{Error, Result};
use hoist::hooks::{HookContext, HookPoint, HookRunner};
use hoist::logs::{DEFAULT_CAPACITY, LogSink};
use hoist::output::Output;
use hoist::ssh::SshConnector;

fn connector(config: &Config) -> SshConnector {
    SshConnector::new(config.timeouts)
}

/// Run `op` with a fresh sink whose chunks are printed as they arrive.
/// Returns once the operation is done and every chunk has been printed.
async fn with_log_printer<F, T>(output: &Output, op: F) -> T
where
    F: AsyncFnOnce(&LogSink) -> T,
{
    let sink = LogSink::new();
    let mut subscription = sink.subscribe(DEFAULT_CAPACITY);
    let printer_output = output.clone();
    let printer = tokio::spawn(async move {
        while let Some(chunk) = subscription.recv().await {
            printer_output.chunk(&chunk);
        }
        subscription.dropped()
    });

    let value = op(&sink).await;
    drop(sink);

    match printer.await {
        Ok(0) => {}
        Ok(dropped) => output.warning(&format!("{dropped} log chunk(s) were dropped")),
        Err(e) => tracing::warn!("log printer task failed: {}", e),
    }
    value
}

/// Run the hook for `point` if one exists. A failing fatal hook is an error;
/// any other failing hook is only a warning.
async fn run_hook(
    runner: &HookRunner,
    point: HookPoint,
    context: &HookContext,
    output: &Output,
) -> Result<()> {
    let Some(hook) = runner.run(point, context).await else {
        return Ok(());
    };
    if hook.success {
        return Ok(());
    }

    let message = format!("{} hook failed", point.filename());
    if point.is_fatal() {
        if !hook.stderr.is_empty() {
            output.progress(hook.stderr.trim_end());
        }
        return Err(Error::Hook(message));
    }
    output.warning(&message);
    Ok(())
}

/// Print a deploy/rollback result and turn a failure into an error.
fn report(output: &Output, result: &DeployResult, verb: &str) -> Result<()> {
    for warning in &result.warnings {
        output.warning(warning);
    }
    output.record("result", result);

    if !result.success {
        return Err(Error::OperationFailed(
            result
                .error
                .clone()
                .unwrap_or_else(|| format!("{verb} failed")),
        ));
    }

    let mut message = match &result.release_id {
        Some(id) => format!("{verb} release {id}"),
        None => verb.to_string(),
    };
    if let Some(commit) = &result.commit_hash {
        message.push_str(&format!(" at {}", &commit[..commit.len().min(12)]));
    }
    output.success(&message);
    Ok(())
}
