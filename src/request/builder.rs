//! Builds the remote mutation payload from a declared configuration.

use std::collections::BTreeMap;

use crate::{
    client::{FieldPatch, MonitorRequest},
    merge::{normalize_contacts, normalize_strings},
    models::{
        blocks::DnsBlock,
        contact::{DesiredContact, PersistedContact},
        field::{Desired, Managed},
        monitor::{DesiredMonitor, HttpMethod, MonitorVariant, TimingSemantics},
        state::PersistedState,
    },
    request::error::ValidationError,
};

/// Canonical timeout applied when the user omits it on a timeout variant.
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

/// Values the builder derived instead of taking from the declaration.
///
/// Derived once and carried alongside the request so settle expectations and
/// final-state assembly agree with what was actually sent; recomputing these
/// at each stage is how spurious diffs are born.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedDefaults {
    /// Method derived from body presence when the user declared none.
    pub http_method: Option<HttpMethod>,
    /// Timeout defaulted because the user omitted it on a timeout variant.
    pub timeout: Option<u32>,
}

/// A remote request together with the defaults derived while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    /// The exact payload to send.
    pub request: MonitorRequest,
    /// What the builder filled in on the user's behalf.
    pub defaults: DerivedDefaults,
}

/// Builds the create payload for a declared configuration.
pub fn build_create(desired: &DesiredMonitor) -> Result<BuiltRequest, ValidationError> {
    build(desired, None)
}

/// Builds the update payload for a declared configuration against prior
/// state.
///
/// Fields the user stopped managing but that prior state still tracks are
/// emitted as explicit clears; fields never managed stay omitted. A changed
/// variant is rejected, since variants are immutable after creation.
pub fn build_update(
    desired: &DesiredMonitor,
    prior: &PersistedState,
) -> Result<BuiltRequest, ValidationError> {
    if desired.variant != prior.variant {
        return Err(ValidationError::VariantChanged {
            prior: prior.variant,
            desired: desired.variant,
        });
    }
    build(desired, Some(prior))
}

/// Omit / clear / set decision for one optional scalar field.
fn patch<T: Clone>(
    field: &str,
    desired: &Desired<T>,
    prior_managed: bool,
) -> Result<FieldPatch<T>, ValidationError> {
    match desired {
        Desired::Unknown => Err(ValidationError::UnknownValue { field: field.to_string() }),
        Desired::Value(v) => Ok(FieldPatch::Set(v.clone())),
        Desired::Unmanaged if prior_managed => Ok(FieldPatch::Clear),
        Desired::Unmanaged => Ok(FieldPatch::Omit),
    }
}

/// Rejects a field declared on a variant that does not carry it.
fn forbid<T>(
    field: &str,
    desired: &Desired<T>,
    variant: MonitorVariant,
) -> Result<(), ValidationError> {
    if desired.is_unmanaged() {
        return Ok(());
    }
    Err(ValidationError::FieldNotApplicable { field: field.to_string(), variant })
}

fn managed<T>(prior: Option<&PersistedState>, select: impl Fn(&PersistedState) -> &Managed<T>) -> bool {
    prior.map(|p| select(p).is_managed()).unwrap_or(false)
}

fn build(
    desired: &DesiredMonitor,
    prior: Option<&PersistedState>,
) -> Result<BuiltRequest, ValidationError> {
    let variant = desired.variant;
    let mut request = MonitorRequest::bare(desired.name.clone(), variant, desired.target.clone());
    let mut defaults = DerivedDefaults::default();

    if desired.paused.is_unknown() {
        return Err(ValidationError::UnknownValue { field: "paused".to_string() });
    }

    request.interval = patch("interval", &desired.interval, managed(prior, |p| &p.interval))?;

    // Timing: exactly one of timeout and grace-period is legal per variant.
    match variant.timing() {
        TimingSemantics::GracePeriod => {
            forbid("timeout", &desired.timeout, variant)?;
            request.grace_period =
                patch("grace_period", &desired.grace_period, managed(prior, |p| &p.grace_period))?;
        }
        TimingSemantics::None => {
            forbid("timeout", &desired.timeout, variant)?;
            forbid("grace_period", &desired.grace_period, variant)?;
            // The remote expects the canonical zero for these variants.
            request.timeout = FieldPatch::Set(0);
        }
        TimingSemantics::Timeout => {
            forbid("grace_period", &desired.grace_period, variant)?;
            request.timeout = match &desired.timeout {
                Desired::Unknown => {
                    return Err(ValidationError::UnknownValue { field: "timeout".to_string() })
                }
                Desired::Value(t) => FieldPatch::Set(*t),
                Desired::Unmanaged => {
                    defaults.timeout = Some(DEFAULT_TIMEOUT_SECS);
                    FieldPatch::Set(DEFAULT_TIMEOUT_SECS)
                }
            };
        }
    }

    build_http_fields(desired, prior, &mut request, &mut defaults)?;
    build_port(desired, prior, &mut request)?;
    build_blocks(desired, prior, &mut request)?;
    build_tags(desired, prior, &mut request)?;
    build_contacts(desired, prior, &mut request)?;

    Ok(BuiltRequest { request, defaults })
}

fn build_http_fields(
    desired: &DesiredMonitor,
    prior: Option<&PersistedState>,
    request: &mut MonitorRequest,
    defaults: &mut DerivedDefaults,
) -> Result<(), ValidationError> {
    let variant = desired.variant;
    if !variant.is_http_like() {
        forbid("http_method", &desired.http_method, variant)?;
        forbid("json_body", &desired.json_body, variant)?;
        forbid("form_body", &desired.form_body, variant)?;
        forbid("auth_header", &desired.auth_header, variant)?;
        forbid("ssl_expiry", &desired.ssl_expiry, variant)?;
        return Ok(());
    }

    // At most one body encoding may be set.
    if desired.json_body.as_value().is_some() && desired.form_body.as_value().is_some() {
        return Err(ValidationError::ConflictingBodies);
    }
    if let Some(body) = desired.json_body.as_value() {
        if !(body.is_object() || body.is_array()) {
            return Err(ValidationError::MalformedBody);
        }
    }

    request.json_body = match patch("json_body", &desired.json_body, managed(prior, |p| &p.json_body))? {
        // Explicit empty object means clear the body on the remote.
        FieldPatch::Set(v) if v.as_object().is_some_and(|o| o.is_empty()) => FieldPatch::Clear,
        other => other,
    };
    request.form_body =
        match patch("form_body", &desired.form_body, managed(prior, |p| &p.form_body))? {
            FieldPatch::Set(m) if m.is_empty() => FieldPatch::Clear,
            other => other,
        };
    request.auth_header =
        match patch("auth_header", &desired.auth_header, managed(prior, |p| &p.auth_header))? {
            FieldPatch::Set(s) if s.is_empty() => FieldPatch::Clear,
            other => other,
        };
    request.ssl_expiry =
        patch("ssl_expiry", &desired.ssl_expiry, managed(prior, |p| &p.ssl_expiry))?;

    // Derive the method once when unspecified: POST if any body is being
    // sent, GET otherwise. The same value flows into the settle expectation
    // and the final state through this request.
    request.http_method = match &desired.http_method {
        Desired::Unknown => {
            return Err(ValidationError::UnknownValue { field: "http_method".to_string() })
        }
        Desired::Value(m) => FieldPatch::Set(*m),
        Desired::Unmanaged => {
            let has_body = matches!(request.json_body, FieldPatch::Set(_))
                || matches!(request.form_body, FieldPatch::Set(_));
            let derived = if has_body { HttpMethod::Post } else { HttpMethod::Get };
            defaults.http_method = Some(derived);
            FieldPatch::Set(derived)
        }
    };

    Ok(())
}

fn build_port(
    desired: &DesiredMonitor,
    prior: Option<&PersistedState>,
    request: &mut MonitorRequest,
) -> Result<(), ValidationError> {
    let variant = desired.variant;
    if variant.requires_port() {
        request.port = match patch("port", &desired.port, managed(prior, |p| &p.port))? {
            FieldPatch::Set(p) => FieldPatch::Set(p),
            _ => {
                return Err(ValidationError::MissingRequiredField {
                    field: "port".to_string(),
                    variant,
                })
            }
        };
        return Ok(());
    }
    forbid("port", &desired.port, variant)
}

fn build_blocks(
    desired: &DesiredMonitor,
    prior: Option<&PersistedState>,
    request: &mut MonitorRequest,
) -> Result<(), ValidationError> {
    let variant = desired.variant;

    if variant == MonitorVariant::Dns {
        request.dns = patch("dns", &desired.dns, managed(prior, |p| &p.dns))?;
        if let FieldPatch::Set(block) = &request.dns {
            // Normalize before transmission so the post-write expectation
            // matches what the remote stores.
            request.dns = FieldPatch::Set(DnsBlock {
                record_type: block.record_type,
                expected_values: normalize_strings(&block.expected_values),
            });
        }
    } else {
        forbid("dns", &desired.dns, variant)?;
    }

    if variant == MonitorVariant::Keyword {
        request.assertions =
            patch("assertions", &desired.assertions, managed(prior, |p| &p.assertions))?;
    } else {
        forbid("assertions", &desired.assertions, variant)?;
    }

    if variant == MonitorVariant::Udp {
        request.udp = patch("udp", &desired.udp, managed(prior, |p| &p.udp))?;
    } else {
        forbid("udp", &desired.udp, variant)?;
    }

    Ok(())
}

fn build_tags(
    desired: &DesiredMonitor,
    prior: Option<&PersistedState>,
    request: &mut MonitorRequest,
) -> Result<(), ValidationError> {
    request.tags = match patch("tags", &desired.tags, managed(prior, |p| &p.tags))? {
        FieldPatch::Set(tags) => {
            let normalized = normalize_strings(&tags);
            if normalized.is_empty() {
                FieldPatch::Clear
            } else {
                FieldPatch::Set(normalized)
            }
        }
        other => other,
    };
    Ok(())
}

fn build_contacts(
    desired: &DesiredMonitor,
    prior: Option<&PersistedState>,
    request: &mut MonitorRequest,
) -> Result<(), ValidationError> {
    let declared = match &desired.contacts {
        Desired::Unknown => {
            return Err(ValidationError::UnknownValue { field: "contacts".to_string() })
        }
        Desired::Unmanaged => {
            if managed(prior, |p| &p.contacts) {
                request.contacts = FieldPatch::Clear;
            }
            return Ok(());
        }
        Desired::Value(list) => list,
    };

    if declared.is_empty() {
        request.contacts = FieldPatch::Clear;
        return Ok(());
    }

    let mut seen: BTreeMap<&str, ()> = BTreeMap::new();
    let mut resolved = Vec::with_capacity(declared.len());
    for contact in declared {
        if seen.insert(contact.contact_id.as_str(), ()).is_some() {
            return Err(ValidationError::DuplicateContact {
                contact_id: contact.contact_id.clone(),
            });
        }
        resolved.push(resolve_contact(contact)?);
    }

    request.contacts = FieldPatch::Set(normalize_contacts(&resolved));
    Ok(())
}

/// The remote API treats both delay parameters as mandatory, so an
/// assignment with unknown delays cannot be built.
fn resolve_contact(contact: &DesiredContact) -> Result<PersistedContact, ValidationError> {
    let notify_delay = match &contact.notify_delay {
        Desired::Value(v) => *v,
        _ => {
            return Err(ValidationError::UnknownValue {
                field: format!("contacts[{}].notify_delay", contact.contact_id),
            })
        }
    };
    let repeat_interval = match &contact.repeat_interval {
        Desired::Value(v) => *v,
        _ => {
            return Err(ValidationError::UnknownValue {
                field: format!("contacts[{}].repeat_interval", contact.contact_id),
            })
        }
    };
    Ok(PersistedContact { contact_id: contact.contact_id.clone(), notify_delay, repeat_interval })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{contact, DesiredMonitorBuilder};
    use serde_json::json;

    #[test]
    fn test_heartbeat_gets_grace_period_and_no_timeout() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Heartbeat)
            .grace_period(45)
            .build();
        let built = build_create(&desired).unwrap();

        assert_eq!(built.request.grace_period, FieldPatch::Set(45));
        assert_eq!(built.request.timeout, FieldPatch::Omit);
        assert_eq!(built.defaults.timeout, None);
    }

    #[test]
    fn test_heartbeat_rejects_timeout() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Heartbeat).timeout(30).build();
        let err = build_create(&desired).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FieldNotApplicable {
                field: "timeout".to_string(),
                variant: MonitorVariant::Heartbeat,
            }
        );
    }

    #[test]
    fn test_ping_sends_canonical_zero_timeout() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Ping).build();
        let built = build_create(&desired).unwrap();
        assert_eq!(built.request.timeout, FieldPatch::Set(0));
        assert_eq!(built.request.grace_period, FieldPatch::Omit);
    }

    #[test]
    fn test_http_timeout_defaults_to_canonical_value() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http).build();
        let built = build_create(&desired).unwrap();
        assert_eq!(built.request.timeout, FieldPatch::Set(DEFAULT_TIMEOUT_SECS));
        assert_eq!(built.defaults.timeout, Some(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_method_derived_from_body_presence() {
        let plain = DesiredMonitorBuilder::new(MonitorVariant::Http).build();
        let built = build_create(&plain).unwrap();
        assert_eq!(built.request.http_method, FieldPatch::Set(HttpMethod::Get));
        assert_eq!(built.defaults.http_method, Some(HttpMethod::Get));

        let with_body = DesiredMonitorBuilder::new(MonitorVariant::Http)
            .json_body(json!({"ping": true}))
            .build();
        let built = build_create(&with_body).unwrap();
        assert_eq!(built.request.http_method, FieldPatch::Set(HttpMethod::Post));
        assert_eq!(built.defaults.http_method, Some(HttpMethod::Post));
    }

    #[test]
    fn test_declared_method_is_not_overridden() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http)
            .http_method(HttpMethod::Head)
            .json_body(json!({"ping": true}))
            .build();
        let built = build_create(&desired).unwrap();
        assert_eq!(built.request.http_method, FieldPatch::Set(HttpMethod::Head));
        assert_eq!(built.defaults.http_method, None);
    }

    #[test]
    fn test_body_encodings_are_mutually_exclusive() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http)
            .json_body(json!({"a": 1}))
            .form_body(&[("k", "v")])
            .build();
        assert_eq!(build_create(&desired).unwrap_err(), ValidationError::ConflictingBodies);
    }

    #[test]
    fn test_scalar_json_body_is_malformed() {
        let desired =
            DesiredMonitorBuilder::new(MonitorVariant::Http).json_body(json!("just a string")).build();
        assert_eq!(build_create(&desired).unwrap_err(), ValidationError::MalformedBody);
    }

    #[test]
    fn test_port_required_for_port_variants() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Port).build();
        let err = build_create(&desired).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequiredField {
                field: "port".to_string(),
                variant: MonitorVariant::Port,
            }
        );
    }

    #[test]
    fn test_port_forbidden_elsewhere() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http).port(443).build();
        let err = build_create(&desired).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FieldNotApplicable {
                field: "port".to_string(),
                variant: MonitorVariant::Http,
            }
        );
    }

    #[test]
    fn test_tags_normalized_before_transmission() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http)
            .tags(&["Prod", "prod", " API "])
            .build();
        let built = build_create(&desired).unwrap();
        assert_eq!(
            built.request.tags,
            FieldPatch::Set(vec!["api".to_string(), "prod".to_string()])
        );
    }

    #[test]
    fn test_empty_tags_become_clear() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http).tags(&[]).build();
        let built = build_create(&desired).unwrap();
        assert_eq!(built.request.tags, FieldPatch::Clear);
    }

    #[test]
    fn test_contact_with_unknown_delay_is_rejected() {
        let mut assignment = contact("c1", 0, 0);
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http)
            .contacts(vec![{
                assignment.notify_delay = Desired::Unknown;
                assignment
            }])
            .build();
        let err = build_create(&desired).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownValue { field: "contacts[c1].notify_delay".to_string() }
        );
    }

    #[test]
    fn test_duplicate_contact_ids_rejected() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Http)
            .contacts(vec![contact("c1", 0, 0), contact("c1", 5, 60)])
            .build();
        assert_eq!(
            build_create(&desired).unwrap_err(),
            ValidationError::DuplicateContact { contact_id: "c1".to_string() }
        );
    }

    #[test]
    fn test_update_rejects_variant_change() {
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Ping).build();
        let prior = DesiredMonitorBuilder::new(MonitorVariant::Http).build_state("m1");
        assert_eq!(
            build_update(&desired, &prior).unwrap_err(),
            ValidationError::VariantChanged {
                prior: MonitorVariant::Http,
                desired: MonitorVariant::Ping,
            }
        );
    }

    #[test]
    fn test_update_clears_block_the_user_removed() {
        // Prior state manages an assertion block; the new declaration no
        // longer mentions it. That is a clear, not an omission.
        let prior = DesiredMonitorBuilder::new(MonitorVariant::Keyword)
            .assertions_simple("maintenance")
            .build_state("m1");
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Keyword).build();

        let built = build_update(&desired, &prior).unwrap();
        assert_eq!(built.request.assertions, FieldPatch::Clear);
    }

    #[test]
    fn test_update_omits_block_never_managed() {
        let prior = DesiredMonitorBuilder::new(MonitorVariant::Keyword).build_state("m1");
        let desired = DesiredMonitorBuilder::new(MonitorVariant::Keyword).build();

        let built = build_update(&desired, &prior).unwrap();
        assert_eq!(built.request.assertions, FieldPatch::Omit);
    }

    #[test]
    fn test_unknown_scalar_rejected() {
        let mut desired = DesiredMonitorBuilder::new(MonitorVariant::Http).build();
        desired.interval = Desired::Unknown;
        assert_eq!(
            build_create(&desired).unwrap_err(),
            ValidationError::UnknownValue { field: "interval".to_string() }
        );
    }
}
