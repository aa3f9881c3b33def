//! Eventual-consistency settling.
//!
//! Remote writes are not guaranteed visible on the very next read. After
//! every mutation the orchestrator polls the remote until the observation
//! matches the expected subset of fields for several consecutive polls, with
//! geometric backoff bounded by a policy timeout and the caller's deadline.

mod expected;
mod policy;

pub use expected::Expected;
pub use policy::SettlePolicy;

use thiserror::Error;
use tokio::time::Instant;

use crate::{
    client::{ApiError, MonitorApi},
    models::state::{MonitorId, ObservedMonitor},
};

/// Errors from the settle loop.
#[derive(Debug, Error)]
pub enum SettleError {
    /// The remote did not converge within the allotted time. Carries the
    /// last successfully observed snapshot so callers can make best-effort
    /// progress instead of failing the whole operation.
    #[error("remote state did not converge in time")]
    Timeout {
        /// The most recent successfully fetched snapshot, if any.
        last_observed: Option<Box<ObservedMonitor>>,
    },

    /// A non-transient remote error ended the poll loop.
    #[error("remote API error while settling: {0}")]
    Api(#[from] ApiError),
}

/// One poll bounded by the loop's cutoff. A call that does not resolve by
/// the cutoff must not hold the settler past its budget.
async fn fetch_within<C: MonitorApi + ?Sized>(
    api: &C,
    id: &MonitorId,
    cutoff: Instant,
) -> Option<Result<ObservedMonitor, ApiError>> {
    tokio::time::timeout_at(cutoff, api.get(id)).await.ok()
}

/// Polls the remote until the observation matches `expected` for the
/// policy's required number of consecutive polls.
///
/// The match streak resets on any mismatch or transient fetch error; a
/// NotFound answer counts as a mismatch, since a just-created monitor may
/// briefly 404. The loop stops at the policy timeout or the caller's
/// deadline, whichever comes first, even mid-backoff-sleep or while a poll
/// call itself hangs.
pub async fn settle<C: MonitorApi + ?Sized>(
    api: &C,
    id: &MonitorId,
    expected: &Expected,
    policy: &SettlePolicy,
    deadline: Instant,
) -> Result<ObservedMonitor, SettleError> {
    let cutoff = deadline.min(Instant::now() + policy.timeout);
    let mut backoff = policy.backoff_floor;
    let mut streak: u32 = 0;
    let mut last_observed: Option<ObservedMonitor> = None;

    loop {
        match fetch_within(api, id, cutoff).await {
            None => {
                tracing::warn!(monitor_id = %id, "settle timed out waiting on a poll");
                return Err(SettleError::Timeout { last_observed: last_observed.map(Box::new) });
            }
            Some(Ok(observed)) => {
                if expected.matches(&observed) {
                    streak += 1;
                    tracing::debug!(monitor_id = %id, streak, "observation matches expectation");
                    if streak >= policy.required_matches {
                        return Ok(observed);
                    }
                } else {
                    streak = 0;
                    tracing::debug!(monitor_id = %id, "observation does not match expectation yet");
                }
                last_observed = Some(observed);
            }
            Some(Err(ApiError::NotFound)) => {
                // The write may simply not be visible yet.
                streak = 0;
                tracing::debug!(monitor_id = %id, "monitor not visible yet");
            }
            Some(Err(e)) if e.is_transient() => {
                streak = 0;
                tracing::debug!(monitor_id = %id, error = %e, "transient fetch error, retrying");
            }
            Some(Err(e)) => return Err(SettleError::Api(e)),
        }

        let now = Instant::now();
        if now >= cutoff {
            tracing::warn!(monitor_id = %id, "settle timed out before convergence");
            return Err(SettleError::Timeout { last_observed: last_observed.map(Box::new) });
        }
        tokio::time::sleep_until(cutoff.min(now + backoff)).await;
        backoff = policy.backoff_ceiling.min(backoff * 2);
    }
}

/// Polls the remote until it answers NotFound, confirming a deletion.
///
/// A delete that returned success while reads still answer "exists" is not a
/// confirmed deletion; the same bounded-wait discipline applies.
pub async fn settle_absence<C: MonitorApi + ?Sized>(
    api: &C,
    id: &MonitorId,
    policy: &SettlePolicy,
    deadline: Instant,
) -> Result<(), SettleError> {
    let cutoff = deadline.min(Instant::now() + policy.timeout);
    let mut backoff = policy.backoff_floor;
    let mut streak: u32 = 0;
    let mut last_observed: Option<ObservedMonitor> = None;

    loop {
        match fetch_within(api, id, cutoff).await {
            None => {
                tracing::warn!(monitor_id = %id, "deletion poll timed out mid-call");
                return Err(SettleError::Timeout { last_observed: last_observed.map(Box::new) });
            }
            Some(Err(ApiError::NotFound)) => {
                streak += 1;
                if streak >= policy.required_matches {
                    tracing::debug!(monitor_id = %id, "deletion confirmed");
                    return Ok(());
                }
            }
            Some(Ok(observed)) => {
                streak = 0;
                tracing::debug!(monitor_id = %id, "monitor still visible after delete");
                last_observed = Some(observed);
            }
            Some(Err(e)) if e.is_transient() => {
                streak = 0;
                tracing::debug!(monitor_id = %id, error = %e, "transient fetch error, retrying");
            }
            Some(Err(e)) => return Err(SettleError::Api(e)),
        }

        let now = Instant::now();
        if now >= cutoff {
            tracing::warn!(monitor_id = %id, "deletion not confirmed before timeout");
            return Err(SettleError::Timeout { last_observed: last_observed.map(Box::new) });
        }
        tokio::time::sleep_until(cutoff.min(now + backoff)).await;
        backoff = policy.backoff_ceiling.min(backoff * 2);
    }
}
