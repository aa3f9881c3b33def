//! The CRUD state machine driving one monitor through a reconciliation.

use tokio::time::Instant;

use crate::{
    client::{ApiError, MonitorApi, MonitorRequest},
    merge::{adopt_observed, assemble_after_write, merge_read},
    models::{
        field::Desired,
        monitor::DesiredMonitor,
        state::{MonitorId, MonitorStatus, ObservedMonitor, PersistedState},
    },
    reconcile::{
        diagnostics::{Diagnostic, Outcome},
        error::ReconcileError,
    },
    request::{build_create, build_update, BuiltRequest},
    settle::{settle, settle_absence, Expected, SettleError, SettlePolicy},
};

/// Drives create/read/update/delete/import for one monitor at a time.
///
/// Each operation is sequential and synchronous from the caller's point of
/// view: build, one or more remote calls, a bounded poll loop, state
/// assembly. The calling engine guarantees at most one in-flight operation
/// per logical resource, so no internal locking is needed; concurrent
/// reconciliations of different monitors share nothing mutable.
pub struct Reconciler<C> {
    api: C,
    settle_policy: SettlePolicy,
    pause_policy: SettlePolicy,
}

impl<C: MonitorApi> Reconciler<C> {
    /// Creates a reconciler with the default settle policies.
    pub fn new(api: C) -> Self {
        Self::with_policies(api, SettlePolicy::default(), SettlePolicy::pause_default())
    }

    /// Creates a reconciler with explicit settle policies. `pause_policy`
    /// governs only the run/pause toggle, which converges faster than
    /// full-field settling.
    pub fn with_policies(api: C, settle_policy: SettlePolicy, pause_policy: SettlePolicy) -> Self {
        Self { api, settle_policy, pause_policy }
    }

    /// Creates the monitor described by `desired`.
    ///
    /// On failure no state is returned: there is nothing committed to keep.
    /// A settle timeout degrades to a warning with best-effort state from
    /// the last observation.
    pub async fn create(&self, desired: &DesiredMonitor, deadline: Instant) -> Outcome {
        let built = match build_create(desired) {
            Ok(built) => built,
            Err(e) => return Outcome::aborted(None, ReconcileError::Validation(e).into_diagnostic()),
        };

        tracing::debug!(name = %desired.name, variant = %desired.variant, "creating monitor");
        let initial = match self.api.create(&built.request).await {
            Ok(observed) => observed,
            Err(e) => {
                return Outcome::aborted(None, ReconcileError::RemoteMutation(e).into_diagnostic())
            }
        };
        tracing::info!(monitor_id = %initial.id, "monitor created");

        let id = initial.id.clone();
        let expected_status =
            match self.reconcile_status(&id, &desired.paused, initial.status, deadline).await {
                Ok(status) => status,
                Err(e) => {
                    return Outcome::aborted(
                        None,
                        ReconcileError::RemoteMutation(e).into_diagnostic(),
                    )
                }
            };

        self.finish_write(desired, &built, &id, expected_status, initial, None, deadline).await
    }

    /// Refreshes state from the remote.
    ///
    /// A NotFound answer means the resource is gone: the caller removes it
    /// from state without an error. With no prior (first read after import)
    /// the remote values are adopted unconditionally instead of being merged
    /// against absence.
    pub async fn read(
        &self,
        id: &MonitorId,
        prior: Option<&PersistedState>,
        deadline: Instant,
    ) -> Outcome {
        match self.get_within(id, deadline).await {
            Ok(observed) => {
                let state = match prior {
                    Some(prior) => merge_read(prior, &observed),
                    None => adopt_observed(&observed),
                };
                Outcome::committed(state)
            }
            Err(ApiError::NotFound) => {
                tracing::info!(monitor_id = %id, "monitor no longer exists on the remote");
                Outcome::gone()
            }
            Err(e) => Outcome::aborted(
                prior.cloned(),
                ReconcileError::RemoteRead(e).into_diagnostic(),
            ),
        }
    }

    /// Applies the difference between `desired` and `prior` to the remote.
    ///
    /// Fields the user stopped managing are cleared, not abandoned; failures
    /// leave the prior state untouched.
    pub async fn update(
        &self,
        desired: &DesiredMonitor,
        prior: &PersistedState,
        deadline: Instant,
    ) -> Outcome {
        let built = match build_update(desired, prior) {
            Ok(built) => built,
            Err(e) => {
                return Outcome::aborted(
                    Some(prior.clone()),
                    ReconcileError::Validation(e).into_diagnostic(),
                )
            }
        };

        tracing::debug!(monitor_id = %prior.id, "updating monitor");
        let initial = match self.api.update(&prior.id, &built.request).await {
            Ok(observed) => observed,
            Err(e) => {
                return Outcome::aborted(
                    Some(prior.clone()),
                    ReconcileError::RemoteMutation(e).into_diagnostic(),
                )
            }
        };
        tracing::info!(monitor_id = %prior.id, "monitor updated");

        let expected_status = match self
            .reconcile_status(&prior.id, &desired.paused, initial.status, deadline)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                return Outcome::aborted(
                    Some(prior.clone()),
                    ReconcileError::RemoteMutation(e).into_diagnostic(),
                )
            }
        };

        self.finish_write(
            desired,
            &built,
            &prior.id,
            expected_status,
            initial,
            Some(prior),
            deadline,
        )
        .await
    }

    /// Deletes the monitor and waits until the remote stops answering for
    /// it.
    ///
    /// NotFound on the delete call is success (idempotent delete). If the
    /// remote still answers "exists" past the settle bound, the resource is
    /// kept in state and an error reported, so a later operation retries
    /// instead of silently losing track of it.
    pub async fn delete(&self, prior: &PersistedState, deadline: Instant) -> Outcome {
        match self.api.delete(&prior.id).await {
            Ok(()) => {}
            Err(ApiError::NotFound) => {
                tracing::debug!(monitor_id = %prior.id, "monitor already absent");
                return Outcome::gone();
            }
            Err(e) => {
                return Outcome::aborted(
                    Some(prior.clone()),
                    ReconcileError::RemoteMutation(e).into_diagnostic(),
                )
            }
        }

        match settle_absence(&self.api, &prior.id, &self.settle_policy, deadline).await {
            Ok(()) => {
                tracing::info!(monitor_id = %prior.id, "monitor deleted");
                Outcome::gone()
            }
            Err(SettleError::Timeout { .. }) => Outcome::aborted(
                Some(prior.clone()),
                Diagnostic::error(format!(
                    "delete of monitor {} was accepted but the remote still reports it; \
                     it remains in state for a later retry",
                    prior.id
                )),
            ),
            Err(SettleError::Api(e)) => Outcome::aborted(
                Some(prior.clone()),
                ReconcileError::RemoteMutation(e).into_diagnostic(),
            ),
        }
    }

    /// Adopts an existing remote monitor into fresh state.
    pub async fn import(&self, id: &MonitorId, deadline: Instant) -> Outcome {
        match self.get_within(id, deadline).await {
            Ok(observed) => {
                tracing::info!(monitor_id = %id, "monitor imported");
                Outcome::committed(adopt_observed(&observed))
            }
            Err(ApiError::NotFound) => Outcome::aborted(
                None,
                ReconcileError::ImportNotFound { id: id.clone() }.into_diagnostic(),
            ),
            Err(e) => Outcome::aborted(None, ReconcileError::RemoteRead(e).into_diagnostic()),
        }
    }

    /// One remote read bounded by the caller's deadline.
    async fn get_within(&self, id: &MonitorId, deadline: Instant) -> Result<ObservedMonitor, ApiError> {
        match tokio::time::timeout_at(deadline, self.api.get(id)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transport("caller deadline elapsed".to_string())),
        }
    }

    /// Brings the run/pause toggle in line with the declaration and returns
    /// the status the main settle pass should expect.
    async fn reconcile_status(
        &self,
        id: &MonitorId,
        paused: &Desired<bool>,
        current: MonitorStatus,
        deadline: Instant,
    ) -> Result<Option<MonitorStatus>, ApiError> {
        let want = match paused {
            Desired::Value(true) => MonitorStatus::Paused,
            Desired::Value(false) => MonitorStatus::Running,
            _ => return Ok(None),
        };
        if current != want {
            tracing::debug!(monitor_id = %id, status = ?want, "reconciling run/pause status");
            match want {
                MonitorStatus::Paused => self.api.pause(id).await?,
                MonitorStatus::Running => self.api.start(id).await?,
            };
            // Settle the toggle with the tighter pause policy; a timeout
            // here is absorbed by the main settle pass, which expects the
            // same status.
            match settle(&self.api, id, &Expected::for_status(want), &self.pause_policy, deadline)
                .await
            {
                Ok(_) | Err(SettleError::Timeout { .. }) => {}
                Err(SettleError::Api(e)) => return Err(e),
            }
        }
        Ok(Some(want))
    }

    /// Common tail of create and update: settle, verify child entities,
    /// assemble final state.
    #[allow(clippy::too_many_arguments)]
    async fn finish_write(
        &self,
        desired: &DesiredMonitor,
        built: &BuiltRequest,
        id: &MonitorId,
        expected_status: Option<MonitorStatus>,
        initial: ObservedMonitor,
        prior_on_error: Option<&PersistedState>,
        deadline: Instant,
    ) -> Outcome {
        let mut expected = Expected::from_request(&built.request);
        if let Some(status) = expected_status {
            expected = expected.with_status(status);
        }

        match settle(&self.api, id, &expected, &self.settle_policy, deadline).await {
            Ok(observed) => {
                if let Err(e) = check_contacts_applied(&built.request, &observed) {
                    tracing::error!(monitor_id = %id, error = %e, "partial application detected");
                    return Outcome::aborted(prior_on_error.cloned(), e.into_diagnostic());
                }
                Outcome::committed(assemble_after_write(desired, &built.request, &observed))
            }
            Err(SettleError::Timeout { last_observed }) => {
                // Best-effort state from the freshest snapshot we have; the
                // discrepancy stays visible through the warning and gets
                // reconciled by a subsequent read. Dropped child entities are
                // still fatal: a state understating the declared contacts
                // must never be persisted.
                let observed = last_observed.map(|boxed| *boxed).unwrap_or(initial);
                if let Err(e) = check_contacts_applied(&built.request, &observed) {
                    tracing::error!(monitor_id = %id, error = %e, "partial application detected");
                    return Outcome::aborted(prior_on_error.cloned(), e.into_diagnostic());
                }
                let state = assemble_after_write(desired, &built.request, &observed);
                Outcome::committed(state).with_diagnostic(Diagnostic::warning(format!(
                    "monitor {id} did not converge to the requested configuration in time; \
                     state reflects the last observation and may be imprecise"
                )))
            }
            Err(SettleError::Api(e)) => Outcome::aborted(
                prior_on_error.cloned(),
                ReconcileError::RemoteMutation(e).into_diagnostic(),
            ),
        }
    }
}

/// Verifies that every requested contact survived into the settled
/// observation. A child entity accepted at request time but absent from the
/// settled observation would desynchronize declared and actual state
/// permanently if persisted.
fn check_contacts_applied(
    request: &MonitorRequest,
    observed: &ObservedMonitor,
) -> Result<(), ReconcileError> {
    let requested = request.requested_contact_ids();
    if requested.is_empty() {
        return Ok(());
    }
    let observed_ids: Vec<String> =
        observed.contacts.iter().map(|c| c.contact_id.clone()).collect();
    let missing: Vec<String> =
        requested.iter().filter(|id| !observed_ids.contains(id)).cloned().collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::PartialApplication { requested, observed: observed_ids, missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::MockMonitorApi,
        models::monitor::MonitorVariant,
        reconcile::diagnostics::Severity,
        test_helpers::DesiredMonitorBuilder,
    };

    #[tokio::test]
    async fn test_validation_failure_never_touches_the_remote() {
        // An invalid declaration must fail before any remote call; the mock
        // panics on any unexpected call.
        let api = MockMonitorApi::new();
        let reconciler = Reconciler::new(api);

        let desired = DesiredMonitorBuilder::new(MonitorVariant::Heartbeat).timeout(30).build();
        let outcome = reconciler
            .create(&desired, Instant::now() + std::time::Duration::from_secs(5))
            .await;

        assert!(outcome.state.is_none());
        assert!(outcome.has_errors());
        assert_eq!(outcome.diagnostics[0].path.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_read_not_found_signals_gone_without_error() {
        let mut api = MockMonitorApi::new();
        api.expect_get().returning(|_| Err(ApiError::NotFound));
        let reconciler = Reconciler::new(api);

        let id = MonitorId::new("m1");
        let outcome =
            reconciler.read(&id, None, Instant::now() + std::time::Duration::from_secs(5)).await;

        assert_eq!(outcome.state, None);
        assert!(outcome.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_update_remote_failure_keeps_prior_state() {
        let mut api = MockMonitorApi::new();
        api.expect_update().returning(|_, _| {
            Err(ApiError::Remote { status: 422, message: "rejected".to_string() })
        });
        let reconciler = Reconciler::new(api);

        let prior = DesiredMonitorBuilder::new(MonitorVariant::Http).build_state("m1");
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http).interval(60).build();
        let outcome = reconciler
            .update(&desired, &prior, Instant::now() + std::time::Duration::from_secs(5))
            .await;

        assert_eq!(outcome.state.as_ref(), Some(&prior));
        assert!(outcome.has_errors());
        assert_eq!(outcome.diagnostics[0].severity, Severity::Error);
    }
}
