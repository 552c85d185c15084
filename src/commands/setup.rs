// ABOUTME: Setup command implementation.
// ABOUTME: Provisions the configured server and reports the detected OS and any tolerated failures.

use super::{connector, with_log_printer};
use hoist::config::Config;
use hoist::error::{Error, Result};
use hoist::guard::OperationGuard;
use hoist::output::Output;
use hoist::provision::Provisioner;

pub async fn setup(config: Config, mut output: Output) -> Result<()> {
    output.start_timer();
    let provisioner = Provisioner::new(connector(&config), OperationGuard::new());

    let result = with_log_printer(&output, async |sink| {
        provisioner.setup(&config.server, sink).await
    })
    .await;

    for warning in &result.warnings {
        output.warning(warning);
    }
    output.record("result", &result);

    if !result.success {
        return Err(Error::OperationFailed(
            result.error.unwrap_or_else(|| "setup failed".to_string()),
        ));
    }
    output.success(&format!(
        "Provisioned {} ({})",
        config.server.host,
        result.os.as_deref().unwrap_or("unknown OS")
    ));
    Ok(())
}
