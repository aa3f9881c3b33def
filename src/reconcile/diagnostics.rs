//! Structured diagnostics returned to the declarative-config engine.

use serde::{Deserialize, Serialize};

use crate::models::state::PersistedState;

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The operation was aborted; no mutation was committed beyond what
    /// already succeeded.
    Error,
    /// The operation completed but the result may be imprecise.
    Warning,
}

/// One message surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Whether the operation failed or merely degraded.
    pub severity: Severity,
    /// The configuration field the message refers to, when it names one.
    pub path: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, path: None, message: message.into() }
    }

    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, path: None, message: message.into() }
    }

    /// Attaches a field path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// The result of one reconciliation operation.
///
/// `state` is the new persisted snapshot; `None` means the logical resource
/// no longer exists (confirmed delete, or read of a remotely removed
/// monitor) or, together with an error diagnostic, that nothing was
/// committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The snapshot to persist, written all-or-nothing.
    pub state: Option<PersistedState>,
    /// Errors and warnings accumulated during the operation.
    pub diagnostics: Vec<Diagnostic>,
}

impl Outcome {
    /// A clean result carrying new state.
    pub fn committed(state: PersistedState) -> Self {
        Self { state: Some(state), diagnostics: Vec::new() }
    }

    /// The resource no longer exists; not an error.
    pub fn gone() -> Self {
        Self { state: None, diagnostics: Vec::new() }
    }

    /// An aborted operation, keeping whatever state was last committed.
    pub fn aborted(state: Option<PersistedState>, diagnostic: Diagnostic) -> Self {
        Self { state, diagnostics: vec![diagnostic] }
    }

    /// Adds a diagnostic.
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}
