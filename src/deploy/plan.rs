// ABOUTME: Builds the remote steps of a release: prepare, fetch, install, build, image build, activate, restart.
// ABOUTME: Every path is shell-quoted; build/start commands are operator-supplied shell text.

use super::DeployError;
use super::release::ReleaseLayout;
use crate::config::{DeployStrategy, ProjectConfig, Source};
use crate::shell::quote;
use crate::step::Step;
use crate::types::ReleaseId;

pub fn prepare(release_path: &str) -> Step {
    Step::mandatory(
        "Creating release directory",
        format!("mkdir -p {}", quote(release_path)),
    )
}

/// Shallow single-branch clone, or extraction of a pre-uploaded bundle.
pub fn fetch(project: &ProjectConfig, release_path: &str) -> Result<Step, DeployError> {
    match project.source() {
        Some(Source::Bundle { path }) => Ok(Step::mandatory(
            "Extracting bundle",
            format!("tar -xzf {} -C {}", quote(path), quote(release_path)),
        )),
        Some(Source::Git { url, branch }) => Ok(Step::mandatory(
            "Cloning repository",
            format!(
                "git clone --depth 1 --single-branch --branch {} -- {} {}",
                quote(branch),
                quote(url),
                quote(release_path)
            ),
        )),
        None => Err(DeployError::InvalidProject(format!(
            "project {} has neither repo_url nor local_bundle_path",
            project.name
        ))),
    }
}

/// Production dependency install. Container strategies install inside the
/// image build instead, so they have no separate step.
pub fn install(project: &ProjectConfig, release_path: &str) -> Option<Step> {
    match project.strategy {
        DeployStrategy::Supervisor => Some(Step::mandatory(
            "Installing dependencies",
            format!(
                "cd {} && if [ -f package.json ]; then npm install --production; \
                 else echo 'no package.json, skipping dependency install'; fi",
                quote(release_path)
            ),
        )),
        DeployStrategy::Compose | DeployStrategy::Image => None,
    }
}

pub fn build(project: &ProjectConfig, release_path: &str) -> Option<Step> {
    let command = project.build_command.as_deref()?.trim();
    if command.is_empty() {
        return None;
    }
    Some(Step::mandatory(
        "Building",
        format!("cd {} && {}", quote(release_path), command),
    ))
}

/// Container images for a release, built inside the release directory so
/// that a failing build happens before cutover.
///
/// Single images are tagged with the release id, which lets a rollback run
/// the image that belongs to the release it re-promotes.
pub fn image_build(project: &ProjectConfig, release_path: &str, id: &ReleaseId) -> Option<Step> {
    let command = match project.strategy {
        DeployStrategy::Supervisor => return None,
        DeployStrategy::Compose => format!(
            "cd {} && docker compose -p {} build",
            quote(release_path),
            quote(&container_name(project))
        ),
        DeployStrategy::Image => format!(
            "cd {} && docker build -t {} .",
            quote(release_path),
            quote(&image_tag(project, id))
        ),
    };
    Some(Step::mandatory("Building image", command))
}

/// Repoint `current` at a release.
///
/// The new link is created under a temporary name and renamed over
/// `current`; rename(2) replaces the old link in one operation, so readers
/// see either the old release or the new one, never a missing link.
/// `mv -T` keeps mv from descending into the directory the old link points at.
pub fn activate(layout: &ReleaseLayout, id: &ReleaseId) -> Step {
    let staging = format!(".current-{}", id);
    Step::mandatory(
        "Activating release",
        format!(
            "cd {} && ln -sfn {} {} && mv -Tf {} current",
            quote(layout.root()),
            quote(&ReleaseLayout::link_target(id)),
            quote(&staging),
            quote(&staging)
        ),
    )
}

/// Run the start command from `current`, or the strategy's fallback.
/// Fallbacks never build; container images already exist for `id`.
pub fn restart(project: &ProjectConfig, layout: &ReleaseLayout, id: &ReleaseId) -> Step {
    let command = match project.start_command.as_deref().map(str::trim) {
        Some(start) if !start.is_empty() => start.to_string(),
        _ => fallback_start(project, id),
    };
    Step::mandatory(
        "Restarting application",
        format!("cd {} && {}", quote(&layout.current_link()), command),
    )
}

fn fallback_start(project: &ProjectConfig, id: &ReleaseId) -> String {
    match project.strategy {
        DeployStrategy::Supervisor => format!(
            "(pm2 reload {name} || pm2 start npm --name {name} -- start) && pm2 save",
            name = quote(project.name.as_str())
        ),
        DeployStrategy::Compose => format!(
            "docker compose -p {} up -d --no-build --remove-orphans",
            quote(&container_name(project))
        ),
        DeployStrategy::Image => format!(
            "(docker rm -f {name} >/dev/null 2>&1 || true) \
             && docker run -d --name {name} --restart unless-stopped {image}",
            name = quote(&container_name(project)),
            image = quote(&image_tag(project, id))
        ),
    }
}

/// Compose project and container name: lowercase, dots replaced.
fn container_name(project: &ProjectConfig) -> String {
    project.name.as_str().to_ascii_lowercase().replace('.', "-")
}

fn image_tag(project: &ProjectConfig, id: &ReleaseId) -> String {
    format!("hoist/{}:{}", container_name(project), id)
}

/// Buffered command printing the commit checked out in `current`.
pub fn commit_probe(layout: &ReleaseLayout) -> String {
    format!(
        "git -C {} rev-parse HEAD 2>/dev/null",
        quote(&layout.current_link())
    )
}

/// Accept only a full hex object id from the probe's output.
pub fn parse_commit(stdout: &str) -> Option<String> {
    let hash = stdout.trim();
    let valid = matches!(hash.len(), 40 | 64) && hash.bytes().all(|b| b.is_ascii_hexdigit());
    valid.then(|| hash.to_ascii_lowercase())
}
