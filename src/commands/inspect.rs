// ABOUTME: Read-only commands: host metrics (pulse) and the release inventory.
// ABOUTME: Neither takes the operation guard; they never change the server.

use super::connector;
use hoist::config::Config;
use hoist::deploy::ReleaseDeployer;
use hoist::error::Result;
use hoist::guard::OperationGuard;
use hoist::output::{Output, OutputMode};
use hoist::pulse::PulseCollector;

pub async fn pulse(config: Config, output: Output) -> Result<()> {
    let metrics = PulseCollector::new(connector(&config))
        .collect(&config.server)
        .await?;

    if output.mode() == OutputMode::Json {
        output.record("pulse", &metrics);
        return Ok(());
    }
    output.success(&format!(
        "{}: cpu {:.1}%  memory {:.1}%  disk {:.1}%  up {}",
        config.server.host,
        metrics.cpu,
        metrics.memory,
        metrics.disk,
        format_uptime(metrics.uptime)
    ));
    Ok(())
}

pub async fn releases(config: Config, output: Output) -> Result<()> {
    let project = config.project()?;
    let deployer = ReleaseDeployer::new(connector(&config), OperationGuard::new());
    let inventory = deployer.inventory(&config.server, project).await?;

    if output.mode() == OutputMode::Json {
        output.record("releases", &inventory);
        return Ok(());
    }

    if inventory.releases.is_empty() {
        output.success(&format!("No releases for {} yet", project.name));
        return Ok(());
    }
    for release in &inventory.releases {
        let marker = if inventory.current.as_ref() == Some(release) {
            "*"
        } else {
            " "
        };
        output.progress(&format!("{marker} {release}"));
    }
    match &inventory.current {
        Some(current) => output.success(&format!("Current release: {current}")),
        None => output.success("No release is active"),
    }
    Ok(())
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
