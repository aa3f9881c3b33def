//! The expected-subset predicate a settle loop converges on.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    client::{FieldPatch, MonitorRequest},
    merge::normalize_strings,
    models::{
        blocks::{AssertionBlock, DnsBlock, SslExpiryBlock, UdpBlock},
        monitor::{HttpMethod, MonitorVariant},
        state::{MonitorStatus, ObservedMonitor},
    },
};

/// The subset of fields a settle loop compares against each observation.
///
/// Only fields the caller actually manages carry an expectation; everything
/// else is excluded from the comparison so the loop never waits on drift the
/// user never asked to control. For optional fields, `Some(None)` expects
/// the field to be absent (a confirmed clear).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expected {
    /// Expected monitor name.
    pub name: Option<String>,
    /// Expected variant.
    pub variant: Option<MonitorVariant>,
    /// Expected check interval.
    pub interval: Option<u32>,
    /// Expected timeout, or expected absence.
    pub timeout: Option<Option<u32>>,
    /// Expected grace period, or expected absence.
    pub grace_period: Option<Option<u32>>,
    /// Expected HTTP method, or expected absence.
    pub http_method: Option<Option<HttpMethod>>,
    /// Expected JSON body, or expected absence.
    pub json_body: Option<Option<serde_json::Value>>,
    /// Expected form body, or expected absence.
    pub form_body: Option<Option<BTreeMap<String, String>>>,
    /// Expected auth header, or expected absence.
    pub auth_header: Option<Option<String>>,
    /// Expected port, or expected absence.
    pub port: Option<Option<u16>>,
    /// Expected SSL expiry block, or expected absence.
    pub ssl_expiry: Option<Option<SslExpiryBlock>>,
    /// Expected DNS block, or expected absence.
    pub dns: Option<Option<DnsBlock>>,
    /// Expected assertion block, or expected absence.
    pub assertions: Option<Option<AssertionBlock>>,
    /// Expected UDP block, or expected absence.
    pub udp: Option<Option<UdpBlock>>,
    /// Expected normalized tag set; empty expects a confirmed clear.
    pub tags: Option<Vec<String>>,
    /// Expected assigned contact ids.
    pub contact_ids: Option<BTreeSet<String>>,
    /// Expected run/pause status.
    pub status: Option<MonitorStatus>,
}

fn from_patch<T: Clone>(patch: &FieldPatch<T>) -> Option<Option<T>> {
    patch.expected_outcome().map(|o| o.cloned())
}

impl Expected {
    /// Derives the implied expectation of a just-built request: every field
    /// the request touched, with the builder's derived defaults already
    /// baked in.
    pub fn from_request(request: &MonitorRequest) -> Self {
        Self {
            name: Some(request.name.clone()),
            variant: Some(request.variant),
            interval: match &request.interval {
                FieldPatch::Set(v) => Some(*v),
                _ => None,
            },
            timeout: from_patch(&request.timeout),
            grace_period: from_patch(&request.grace_period),
            http_method: from_patch(&request.http_method),
            json_body: from_patch(&request.json_body),
            form_body: from_patch(&request.form_body),
            auth_header: from_patch(&request.auth_header),
            port: from_patch(&request.port),
            ssl_expiry: from_patch(&request.ssl_expiry),
            dns: from_patch(&request.dns),
            assertions: from_patch(&request.assertions),
            udp: from_patch(&request.udp),
            tags: match &request.tags {
                FieldPatch::Omit => None,
                FieldPatch::Clear => Some(Vec::new()),
                FieldPatch::Set(tags) => Some(normalize_strings(tags)),
            },
            contact_ids: match &request.contacts {
                FieldPatch::Omit => None,
                FieldPatch::Clear => Some(BTreeSet::new()),
                FieldPatch::Set(contacts) => {
                    Some(contacts.iter().map(|c| c.contact_id.clone()).collect())
                }
            },
            status: None,
        }
    }

    /// The degenerate expectation used when settling the run/pause toggle.
    pub fn for_status(status: MonitorStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    /// Adds a status expectation.
    pub fn with_status(mut self, status: MonitorStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Compares every expected field against the observation, using the same
    /// normalization rules as the request builder.
    pub fn matches(&self, observed: &ObservedMonitor) -> bool {
        if let Some(name) = &self.name {
            if name != &observed.name {
                return false;
            }
        }
        if let Some(variant) = self.variant {
            if variant != observed.variant {
                return false;
            }
        }
        if let Some(interval) = self.interval {
            if interval != observed.interval {
                return false;
            }
        }
        if let Some(timeout) = self.timeout {
            if timeout != observed.timeout {
                return false;
            }
        }
        if let Some(grace) = self.grace_period {
            if grace != observed.grace_period {
                return false;
            }
        }
        if let Some(method) = self.http_method {
            if method != observed.http_method {
                return false;
            }
        }
        if let Some(body) = &self.json_body {
            if body != &observed.json_body {
                return false;
            }
        }
        if let Some(form) = &self.form_body {
            if form != &observed.form_body {
                return false;
            }
        }
        if let Some(auth) = &self.auth_header {
            if auth != &observed.auth_header {
                return false;
            }
        }
        if let Some(port) = self.port {
            if port != observed.port {
                return false;
            }
        }
        if let Some(ssl) = &self.ssl_expiry {
            if ssl != &observed.ssl_expiry {
                return false;
            }
        }
        if let Some(dns) = &self.dns {
            if !dns_matches(dns.as_ref(), observed.dns.as_ref()) {
                return false;
            }
        }
        if let Some(assertions) = &self.assertions {
            if assertions != &observed.assertions {
                return false;
            }
        }
        if let Some(udp) = &self.udp {
            if udp != &observed.udp {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if tags != &normalize_strings(&observed.tags) {
                return false;
            }
        }
        if let Some(ids) = &self.contact_ids {
            let observed_ids: BTreeSet<String> =
                observed.contacts.iter().map(|c| c.contact_id.clone()).collect();
            if ids != &observed_ids {
                return false;
            }
        }
        if let Some(status) = self.status {
            if status != observed.status {
                return false;
            }
        }
        true
    }
}

fn dns_matches(expected: Option<&DnsBlock>, observed: Option<&DnsBlock>) -> bool {
    match (expected, observed) {
        (None, None) => true,
        (Some(e), Some(o)) => {
            e.record_type == o.record_type
                && normalize_strings(&e.expected_values) == normalize_strings(&o.expected_values)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ObservedMonitorBuilder;

    #[test]
    fn test_empty_expectation_matches_anything() {
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http).build();
        assert!(Expected::default().matches(&observed));
    }

    #[test]
    fn test_unmanaged_fields_are_excluded_from_comparison() {
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http)
            .tags(&["remote-drift"])
            .timeout(99)
            .build();
        // Only the name is expected; drifted tags and timeout do not block
        // convergence.
        let expected = Expected { name: Some("test-monitor".to_string()), ..Default::default() };
        assert!(expected.matches(&observed));
    }

    #[test]
    fn test_expected_clear_requires_absence() {
        let expected = Expected { timeout: Some(None), ..Default::default() };
        let cleared = ObservedMonitorBuilder::new("m1", MonitorVariant::Http).build();
        let present = ObservedMonitorBuilder::new("m1", MonitorVariant::Http).timeout(30).build();
        assert!(expected.matches(&cleared));
        assert!(!expected.matches(&present));
    }

    #[test]
    fn test_tag_comparison_ignores_remote_casing() {
        let expected = Expected {
            tags: Some(vec!["api".to_string(), "prod".to_string()]),
            ..Default::default()
        };
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http)
            .tags(&["PROD", "Api"])
            .build();
        assert!(expected.matches(&observed));
    }

    #[test]
    fn test_status_only_expectation() {
        let observed = ObservedMonitorBuilder::new("m1", MonitorVariant::Http)
            .status(MonitorStatus::Paused)
            .build();
        assert!(Expected::for_status(MonitorStatus::Paused).matches(&observed));
        assert!(!Expected::for_status(MonitorStatus::Running).matches(&observed));
    }
}
