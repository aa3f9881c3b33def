//! Final-state assembly.
//!
//! Combines a converged remote observation with the operation's baseline:
//! the declaration and its just-built request after a write (there is no
//! prior on create, and an update request already encodes every managed
//! field as set-or-clear), the prior persisted state on read, or nothing at
//! all on import.

use chrono::Utc;

use crate::{
    client::{FieldPatch, MonitorRequest},
    merge::{merge_contacts, merge_field, merge_tags, normalize_strings},
    migrate::CURRENT_SCHEMA_VERSION,
    models::{
        blocks::DnsBlock,
        contact::PersistedContact,
        field::{Desired, Managed},
        monitor::DesiredMonitor,
        state::{MonitorStatus, ObservedMonitor, PersistedState},
    },
};

/// Adopts an observed value under the declaration's managed-ness.
///
/// A set patch keeps the field managed, derived defaults included. A clear
/// patch stays managed only while the user still declares the field (an
/// explicit empty value); a clear issued because the user stopped declaring
/// the field releases it, so later updates omit it instead of re-clearing.
fn adopt<T: Clone, D>(
    patch: &FieldPatch<T>,
    declared: &Desired<D>,
    observed: Option<&T>,
) -> Managed<T> {
    match patch {
        FieldPatch::Omit => Managed::Unmanaged,
        FieldPatch::Clear if declared.as_value().is_none() => Managed::Unmanaged,
        FieldPatch::Clear | FieldPatch::Set(_) => match observed {
            Some(v) => Managed::Value(v.clone()),
            None => Managed::Cleared,
        },
    }
}

fn normalize_dns(block: &DnsBlock) -> DnsBlock {
    DnsBlock {
        record_type: block.record_type,
        expected_values: normalize_strings(&block.expected_values),
    }
}

fn observed_contacts(observed: &ObservedMonitor) -> Vec<PersistedContact> {
    observed.contacts.iter().map(PersistedContact::from).collect()
}

/// Assembles persisted state after a successful create or update.
///
/// Managed-ness follows the declaration: a field stays managed when the user
/// declares it or the builder derived a value for it, and decays to
/// unmanaged once a clear issued for a no-longer-declared field is
/// confirmed. The derived defaults the builder baked into the request
/// (method, timeout) flow through here unchanged, so build, settle
/// expectation and final state agree.
pub fn assemble_after_write(
    desired: &DesiredMonitor,
    request: &MonitorRequest,
    observed: &ObservedMonitor,
) -> PersistedState {
    let contacts = observed_contacts(observed);
    PersistedState {
        schema_version: CURRENT_SCHEMA_VERSION,
        id: observed.id.clone(),
        name: observed.name.clone(),
        variant: observed.variant,
        target: observed.target.clone(),
        interval: adopt(&request.interval, &desired.interval, Some(&observed.interval)),
        timeout: adopt(&request.timeout, &desired.timeout, observed.timeout.as_ref()),
        grace_period: adopt(
            &request.grace_period,
            &desired.grace_period,
            observed.grace_period.as_ref(),
        ),
        http_method: adopt(&request.http_method, &desired.http_method, observed.http_method.as_ref()),
        json_body: adopt(&request.json_body, &desired.json_body, observed.json_body.as_ref()),
        form_body: adopt(&request.form_body, &desired.form_body, observed.form_body.as_ref()),
        auth_header: adopt(&request.auth_header, &desired.auth_header, observed.auth_header.as_ref()),
        port: adopt(&request.port, &desired.port, observed.port.as_ref()),
        ssl_expiry: adopt(&request.ssl_expiry, &desired.ssl_expiry, observed.ssl_expiry.as_ref()),
        dns: adopt(&request.dns, &desired.dns, observed.dns.as_ref()).map(|b| normalize_dns(&b)),
        assertions: adopt(&request.assertions, &desired.assertions, observed.assertions.as_ref()),
        udp: adopt(&request.udp, &desired.udp, observed.udp.as_ref()),
        tags: match &request.tags {
            FieldPatch::Omit => Managed::Unmanaged,
            FieldPatch::Clear if desired.tags.as_value().is_none() => Managed::Unmanaged,
            _ => merge_tags(&Managed::Cleared, &observed.tags),
        },
        contacts: match &request.contacts {
            FieldPatch::Omit => Managed::Unmanaged,
            FieldPatch::Clear if desired.contacts.as_value().is_none() => Managed::Unmanaged,
            _ => merge_contacts(&Managed::Cleared, &contacts),
        },
        paused: match &desired.paused {
            Desired::Unmanaged | Desired::Unknown => Managed::Unmanaged,
            Desired::Value(_) => Managed::Value(observed.status == MonitorStatus::Paused),
        },
        last_synced_at: Utc::now(),
    }
}

/// Merges a fresh observation into prior state on read.
///
/// Fields the user never managed stay unmanaged; managed fields whose remote
/// value disappeared become cleared so drift stays visible.
pub fn merge_read(prior: &PersistedState, observed: &ObservedMonitor) -> PersistedState {
    let contacts = observed_contacts(observed);
    PersistedState {
        schema_version: CURRENT_SCHEMA_VERSION,
        id: observed.id.clone(),
        name: observed.name.clone(),
        variant: observed.variant,
        target: observed.target.clone(),
        interval: merge_field(&prior.interval, Some(&observed.interval)),
        timeout: merge_field(&prior.timeout, observed.timeout.as_ref()),
        grace_period: merge_field(&prior.grace_period, observed.grace_period.as_ref()),
        http_method: merge_field(&prior.http_method, observed.http_method.as_ref()),
        json_body: merge_field(&prior.json_body, observed.json_body.as_ref()),
        form_body: merge_field(&prior.form_body, observed.form_body.as_ref()),
        auth_header: merge_field(&prior.auth_header, observed.auth_header.as_ref()),
        port: merge_field(&prior.port, observed.port.as_ref()),
        ssl_expiry: merge_field(&prior.ssl_expiry, observed.ssl_expiry.as_ref()),
        dns: merge_field(&prior.dns, observed.dns.as_ref()).map(|b| normalize_dns(&b)),
        assertions: merge_field(&prior.assertions, observed.assertions.as_ref()),
        udp: merge_field(&prior.udp, observed.udp.as_ref()),
        tags: merge_tags(&prior.tags, &observed.tags),
        contacts: merge_contacts(&prior.contacts, &contacts),
        paused: match &prior.paused {
            Managed::Unmanaged => Managed::Unmanaged,
            _ => Managed::Value(observed.status == MonitorStatus::Paused),
        },
        last_synced_at: Utc::now(),
    }
}

/// Adopts a remote snapshot unconditionally, for import and first read.
///
/// Absent remote fields become unmanaged rather than cleared, so the next
/// reconciliation treats them as not yet adopted.
pub fn adopt_observed(observed: &ObservedMonitor) -> PersistedState {
    let contacts = crate::merge::normalize_contacts(&observed_contacts(observed));
    PersistedState {
        schema_version: CURRENT_SCHEMA_VERSION,
        id: observed.id.clone(),
        name: observed.name.clone(),
        variant: observed.variant,
        target: observed.target.clone(),
        interval: Managed::Value(observed.interval),
        timeout: Managed::from_option(observed.timeout),
        grace_period: Managed::from_option(observed.grace_period),
        http_method: Managed::from_option(observed.http_method),
        json_body: Managed::from_option(observed.json_body.clone()),
        form_body: Managed::from_option(observed.form_body.clone()),
        auth_header: Managed::from_option(observed.auth_header.clone()),
        port: Managed::from_option(observed.port),
        ssl_expiry: Managed::from_option(observed.ssl_expiry.clone()),
        dns: Managed::from_option(observed.dns.clone().map(|b| normalize_dns(&b))),
        assertions: Managed::from_option(observed.assertions.clone()),
        udp: Managed::from_option(observed.udp.clone()),
        tags: if observed.tags.is_empty() {
            Managed::Unmanaged
        } else {
            Managed::Value(normalize_strings(&observed.tags))
        },
        contacts: if contacts.is_empty() {
            Managed::Unmanaged
        } else {
            Managed::Value(contacts)
        },
        paused: Managed::Value(observed.status == MonitorStatus::Paused),
        last_synced_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::monitor::MonitorVariant,
        test_helpers::ObservedMonitorBuilder,
    };

    fn bare_desired(variant: MonitorVariant) -> DesiredMonitor {
        DesiredMonitor::new("test-monitor", variant, "https://example.com")
    }

    #[test]
    fn test_after_write_untouched_fields_stay_unmanaged() {
        let desired = bare_desired(MonitorVariant::Http);
        let request = MonitorRequest::bare("api", MonitorVariant::Http, "https://example.com");
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http)
            .timeout(30)
            .tags(&["prod"])
            .build();

        let state = assemble_after_write(&desired, &request, &observed);

        // The remote reports values, but nothing in the request touched them.
        assert_eq!(state.timeout, Managed::Unmanaged);
        assert_eq!(state.tags, Managed::Unmanaged);
        assert_eq!(state.paused, Managed::Unmanaged);
    }

    #[test]
    fn test_after_write_declared_empty_reads_back_cleared() {
        // The user declares an explicitly empty value; the field stays
        // managed so read-back keeps tracking it.
        let mut desired = bare_desired(MonitorVariant::Http);
        desired.auth_header = Desired::Value(String::new());
        let mut request = MonitorRequest::bare("api", MonitorVariant::Http, "https://example.com");
        request.auth_header = FieldPatch::Clear;
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http).build();

        let state = assemble_after_write(&desired, &request, &observed);

        assert_eq!(state.auth_header, Managed::Cleared);
    }

    #[test]
    fn test_after_write_confirmed_clear_of_undeclared_field_decays() {
        // The user stopped declaring the field; the clear was its last
        // managed act, and once confirmed the field is released so later
        // updates omit it instead of re-clearing forever.
        let desired = bare_desired(MonitorVariant::Http);
        let mut request = MonitorRequest::bare("api", MonitorVariant::Http, "https://example.com");
        request.auth_header = FieldPatch::Clear;
        request.interval = FieldPatch::Clear;
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http).build();

        let state = assemble_after_write(&desired, &request, &observed);

        assert_eq!(state.auth_header, Managed::Unmanaged);
        assert_eq!(state.interval, Managed::Unmanaged);
    }

    #[test]
    fn test_read_merge_preserves_unmanaged() {
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http)
            .timeout(30)
            .build();
        let prior = adopt_observed(&observed);
        let mut prior = prior;
        prior.tags = Managed::Unmanaged;

        let drifted = ObservedMonitorBuilder::new("m1", MonitorVariant::Http)
            .timeout(60)
            .tags(&["injected"])
            .build();
        let merged = merge_read(&prior, &drifted);

        assert_eq!(merged.timeout, Managed::Value(60));
        assert_eq!(merged.tags, Managed::Unmanaged);
    }

    #[test]
    fn test_import_adopts_everything_present() {
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Keyword)
            .timeout(30)
            .tags(&["Prod", "prod"])
            .build();
        let state = adopt_observed(&observed);

        assert_eq!(state.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(state.timeout, Managed::Value(30));
        assert_eq!(state.tags, Managed::Value(vec!["prod".to_string()]));
        assert_eq!(state.grace_period, Managed::Unmanaged);
    }
}
