//! Orchestrator-level error taxonomy.

use thiserror::Error;

use crate::{
    client::ApiError,
    models::state::MonitorId,
    reconcile::diagnostics::Diagnostic,
    request::ValidationError,
};

/// Errors the orchestrator converts into diagnostics.
///
/// Lower layers never swallow errors; this is the only layer permitted to
/// downgrade one into a best-effort partial result, and only for settle
/// timeouts.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Build-time validation failure. Raised before any remote effect.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A remote mutation failed; its effect is uncertain. The remote detail
    /// is surfaced verbatim.
    #[error("remote mutation failed: {0}")]
    RemoteMutation(ApiError),

    /// A remote read failed for a reason other than NotFound.
    #[error("remote read failed: {0}")]
    RemoteRead(ApiError),

    /// The monitor to import does not exist.
    #[error("monitor {id} not found on the remote")]
    ImportNotFound {
        /// The id that was requested.
        id: MonitorId,
    },

    /// The remote accepted a mutation but measurably did not apply part of
    /// it. Persisting a state that understates the declared configuration is
    /// strictly worse than failing loudly, so this is fatal.
    #[error(
        "remote accepted the request but did not apply it fully: \
         contacts requested [{}], observed [{}], missing [{}]",
        requested.join(", "),
        observed.join(", "),
        missing.join(", ")
    )]
    PartialApplication {
        /// Contact ids the request asked for.
        requested: Vec<String>,
        /// Contact ids present in the settled observation.
        observed: Vec<String>,
        /// Contact ids that were silently dropped.
        missing: Vec<String>,
    },
}

impl ReconcileError {
    /// Converts the error into its user-facing diagnostic.
    pub fn into_diagnostic(self) -> Diagnostic {
        match &self {
            ReconcileError::Validation(e) => match e.field_path() {
                Some(path) => Diagnostic::error(self.to_string()).with_path(path),
                None => Diagnostic::error(self.to_string()),
            },
            ReconcileError::PartialApplication { .. } => {
                Diagnostic::error(self.to_string()).with_path("contacts")
            }
            _ => Diagnostic::error(self.to_string()),
        }
    }
}
