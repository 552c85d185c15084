// ABOUTME: Diagnostics accumulator for non-fatal problems during a pipeline.
// ABOUTME: Collects warnings that do not fail an operation but are reported with its result.

/// Collects non-fatal warnings during an operation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warning messages in the order they were recorded.
    pub fn into_messages(self) -> Vec<String> {
        self.warnings.into_iter().map(|w| w.message).collect()
    }
}

/// A non-fatal warning collected during an operation.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A best-effort step exited nonzero and was skipped over.
    pub fn step_tolerated(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StepTolerated,
            message: message.into(),
        }
    }

    pub fn session_close(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SessionClose,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    StepTolerated,
    /// Failed to cleanly close the SSH session.
    SessionClose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_keeps_order() {
        let mut diag = Diagnostics::default();
        diag.warn(Warning::step_tolerated("ufw enable exited 1"));
        diag.warn(Warning::session_close("connection reset"));

        assert_eq!(diag.warnings()[1].kind, WarningKind::SessionClose);
        assert_eq!(
            diag.into_messages(),
            vec!["ufw enable exited 1", "connection reset"]
        );
    }
}
