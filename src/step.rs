// ABOUTME: Remote pipeline steps tagged mandatory or best-effort, and the runner that enforces the tag.
// ABOUTME: A failing mandatory step aborts; a failing best-effort step becomes a warning.

use crate::diagnostics::{Diagnostics, Warning};
use crate::logs::LogSink;
use crate::ssh::{self, Remote};

/// One remote command in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Operator-facing label, also used in error messages.
    pub name: String,
    pub command: String,
    /// Whether a nonzero exit aborts the pipeline.
    pub mandatory: bool,
}

impl Step {
    pub fn mandatory(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            mandatory: true,
        }
    }

    pub fn best_effort(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            mandatory: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// Best-effort step that exited nonzero.
    Tolerated { exit_code: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("step '{step}' failed with exit code {exit_code}")]
    Failed { step: String, exit_code: u32 },

    /// Transport failures abort regardless of the step's tag: the
    /// connection every later step needs is gone.
    #[error("step '{step}' could not run: {source}")]
    Transport {
        step: String,
        #[source]
        source: ssh::Error,
    },
}

impl StepError {
    pub fn step(&self) -> &str {
        match self {
            StepError::Failed { step, .. } | StepError::Transport { step, .. } => step,
        }
    }
}

/// Runs steps in order against one remote, streaming their output.
pub struct StepRunner<'a, R: Remote + ?Sized> {
    remote: &'a R,
    sink: &'a LogSink,
}

impl<'a, R: Remote + ?Sized> StepRunner<'a, R> {
    pub fn new(remote: &'a R, sink: &'a LogSink) -> Self {
        Self { remote, sink }
    }

    /// Run one step to process exit.
    pub async fn run(
        &self,
        step: &Step,
        diag: &mut Diagnostics,
    ) -> Result<StepOutcome, StepError> {
        self.sink.info(format!("==> {}", step.name)).await;
        tracing::debug!(step = %step.name, mandatory = step.mandatory, "running step");

        let exit_code = self
            .remote
            .exec_stream(&step.command, self.sink)
            .await
            .map_err(|source| StepError::Transport {
                step: step.name.clone(),
                source,
            })?;

        match (exit_code, step.mandatory) {
            (0, _) => Ok(StepOutcome::Succeeded),
            (code, true) => {
                self.sink
                    .info(format!("!! {} failed (exit code {})", step.name, code))
                    .await;
                Err(StepError::Failed {
                    step: step.name.clone(),
                    exit_code: code,
                })
            }
            (code, false) => {
                self.sink
                    .info(format!("-- {} exited {}, continuing", step.name, code))
                    .await;
                diag.warn(Warning::step_tolerated(format!(
                    "{} exited with code {}",
                    step.name, code
                )));
                Ok(StepOutcome::Tolerated { exit_code: code })
            }
        }
    }

    /// Run steps in order, stopping at the first error.
    pub async fn run_all(&self, steps: &[Step], diag: &mut Diagnostics) -> Result<(), StepError> {
        for step in steps {
            self.run(step, diag).await?;
        }
        Ok(())
    }
}
