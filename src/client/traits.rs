//! This module defines the interface for the remote monitoring API.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::{
    client::types::MonitorRequest,
    models::state::{MonitorId, ObservedMonitor},
};

/// Errors returned by the remote monitoring API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The monitor does not exist. A control-flow signal on read and delete,
    /// not a failure.
    #[error("monitor not found")]
    NotFound,

    /// The remote rejected the call because of rate limiting.
    #[error("rate limited by remote API")]
    RateLimited,

    /// The remote answered with an error status.
    #[error("remote API error (status {status}): {message}")]
    Remote {
        /// HTTP status code of the response.
        status: u16,
        /// Error detail reported by the remote, surfaced verbatim.
        message: String,
    },

    /// The call never reached the remote.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Whether retrying the same call later could succeed. Transient errors
    /// reset a settle match streak instead of aborting the poll loop.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited | ApiError::Transport(_) => true,
            ApiError::Remote { status, .. } => *status >= 500,
            ApiError::NotFound => false,
        }
    }
}

/// The remote monitoring API surface this crate consumes.
///
/// Calls are synchronous from the caller's point of view and may be slow to
/// reflect their own effects; the reconciliation core never re-issues a
/// create or update on ambiguous failure, to avoid duplicate remote objects.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MonitorApi: Send + Sync {
    /// Creates a monitor and returns the remote's initial snapshot.
    async fn create(&self, request: &MonitorRequest) -> Result<ObservedMonitor, ApiError>;

    /// Fetches the current snapshot of a monitor.
    async fn get(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError>;

    /// Applies a mutation to an existing monitor.
    async fn update(
        &self,
        id: &MonitorId,
        request: &MonitorRequest,
    ) -> Result<ObservedMonitor, ApiError>;

    /// Deletes a monitor.
    async fn delete(&self, id: &MonitorId) -> Result<(), ApiError>;

    /// Pauses a monitor.
    async fn pause(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError>;

    /// Resumes a paused monitor.
    async fn start(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError>;
}

#[async_trait]
impl<T: MonitorApi + ?Sized> MonitorApi for std::sync::Arc<T> {
    async fn create(&self, request: &MonitorRequest) -> Result<ObservedMonitor, ApiError> {
        (**self).create(request).await
    }

    async fn get(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        (**self).get(id).await
    }

    async fn update(
        &self,
        id: &MonitorId,
        request: &MonitorRequest,
    ) -> Result<ObservedMonitor, ApiError> {
        (**self).update(id, request).await
    }

    async fn delete(&self, id: &MonitorId) -> Result<(), ApiError> {
        (**self).delete(id).await
    }

    async fn pause(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        (**self).pause(id).await
    }

    async fn start(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        (**self).start(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transience_classification() {
        assert!(ApiError::RateLimited.is_transient());
        assert!(ApiError::Transport("connection reset".into()).is_transient());
        assert!(ApiError::Remote { status: 503, message: "unavailable".into() }.is_transient());
        assert!(!ApiError::Remote { status: 422, message: "bad field".into() }.is_transient());
        assert!(!ApiError::NotFound.is_transient());
    }
}
