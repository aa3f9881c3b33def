//! The reconciliation orchestrator.
//!
//! Sequences validation, request building, remote mutation, settling and
//! state assembly for each of create/read/update/delete/import, and decides
//! which failures abort an operation and which degrade to warnings.

mod diagnostics;
mod error;
mod orchestrator;

pub use diagnostics::{Diagnostic, Outcome, Severity};
pub use error::ReconcileError;
pub use orchestrator::Reconciler;
