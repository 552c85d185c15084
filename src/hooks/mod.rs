// ABOUTME: Local lifecycle hooks run around deploys and rollbacks.
// ABOUTME: Discovers executable scripts under .hoist/hooks and runs them with HOIST_* environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub const HOOKS_DIR: &str = ".hoist/hooks";

/// Points in an operation where a hook may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before connecting. Failure aborts the deploy.
    PreDeploy,
    PostDeploy,
    PostRollback,
    /// After a failed deploy or rollback.
    OnError,
}

impl HookPoint {
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::PostRollback => "post-rollback",
            HookPoint::OnError => "on-error",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub project: String,
    pub server: String,
    /// Unknown before the deploy has picked an id.
    pub release: Option<String>,
    /// `success` or `failure` once the operation has finished.
    pub status: Option<&'static str>,
}

impl HookContext {
    pub fn new(project: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            server: server.into(),
            release: None,
            status: None,
        }
    }

    /// Context after an operation finished.
    pub fn finished(&self, release: Option<String>, success: bool) -> Self {
        Self {
            release,
            status: Some(if success { "success" } else { "failure" }),
            ..self.clone()
        }
    }

    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("HOIST_PROJECT".to_string(), self.project.clone());
        env.insert("HOIST_SERVER".to_string(), self.server.clone());
        if let Some(release) = &self.release {
            env.insert("HOIST_RELEASE".to_string(), release.clone());
        }
        if let Some(status) = self.status {
            env.insert("HOIST_STATUS".to_string(), status.to_string());
        }
        env
    }
}

#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            hooks_dir: project_dir.join(HOOKS_DIR),
        }
    }

    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists. `None` means there was no hook to run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);
        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let result = match output {
            Ok(output) => HookResult {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        };

        if !result.success {
            tracing::warn!(
                "{} hook failed with exit code {:?}",
                point.filename(),
                result.exit_code
            );
        }
        Some(result)
    }
}
