//! Wire request types sent to the remote API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    blocks::{AssertionBlock, DnsBlock, SslExpiryBlock, UdpBlock},
    contact::PersistedContact,
    monitor::{HttpMethod, MonitorVariant},
};

/// Per-field mutation instruction on the wire.
///
/// `Omit` leaves the remote value untouched, `Clear` removes it, `Set`
/// replaces it. Distinguishing omit from clear is what lets an update remove
/// a previously managed field without touching fields the user never managed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldPatch<T> {
    /// Do not touch the remote value.
    Omit,
    /// Remove the remote value.
    Clear,
    /// Replace the remote value.
    Set(T),
}

impl<T> FieldPatch<T> {
    /// Returns the value a successful application is expected to produce:
    /// `None` when nothing was requested, `Some(None)` for a clear,
    /// `Some(Some(v))` for a set.
    pub fn expected_outcome(&self) -> Option<Option<&T>> {
        match self {
            FieldPatch::Omit => None,
            FieldPatch::Clear => Some(None),
            FieldPatch::Set(v) => Some(Some(v)),
        }
    }

    /// Returns `true` if the field is not touched.
    pub fn is_omit(&self) -> bool {
        matches!(self, FieldPatch::Omit)
    }
}

impl<T> Default for FieldPatch<T> {
    fn default() -> Self {
        FieldPatch::Omit
    }
}

/// The exact mutation payload for a create or update call.
///
/// Built only by [`crate::request`]; collections arrive here already
/// normalized so the post-write expectation matches what the remote is
/// expected to store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRequest {
    /// Monitor name.
    pub name: String,
    /// Monitor flavor; only meaningful on create.
    pub variant: MonitorVariant,
    /// Checked URL, hostname or address.
    pub target: String,
    /// Check interval in seconds.
    pub interval: FieldPatch<u32>,
    /// Response timeout in seconds; the canonical zero for variants without
    /// timing semantics.
    pub timeout: FieldPatch<u32>,
    /// Heartbeat grace period in seconds.
    pub grace_period: FieldPatch<u32>,
    /// HTTP method.
    pub http_method: FieldPatch<HttpMethod>,
    /// Structured JSON request body.
    pub json_body: FieldPatch<serde_json::Value>,
    /// Key/value request body.
    pub form_body: FieldPatch<BTreeMap<String, String>>,
    /// Authorization header value.
    pub auth_header: FieldPatch<String>,
    /// Destination port.
    pub port: FieldPatch<u16>,
    /// SSL expiry alerting block.
    pub ssl_expiry: FieldPatch<SslExpiryBlock>,
    /// DNS expectation block.
    pub dns: FieldPatch<DnsBlock>,
    /// Response assertion block.
    pub assertions: FieldPatch<AssertionBlock>,
    /// UDP probe block.
    pub udp: FieldPatch<UdpBlock>,
    /// Normalized tag set.
    pub tags: FieldPatch<Vec<String>>,
    /// Alert contact assignments, deduplicated by contact id.
    pub contacts: FieldPatch<Vec<PersistedContact>>,
}

impl MonitorRequest {
    /// Creates a request that touches nothing beyond the mandatory fields.
    pub fn bare(name: impl Into<String>, variant: MonitorVariant, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant,
            target: target.into(),
            interval: FieldPatch::Omit,
            timeout: FieldPatch::Omit,
            grace_period: FieldPatch::Omit,
            http_method: FieldPatch::Omit,
            json_body: FieldPatch::Omit,
            form_body: FieldPatch::Omit,
            auth_header: FieldPatch::Omit,
            port: FieldPatch::Omit,
            ssl_expiry: FieldPatch::Omit,
            dns: FieldPatch::Omit,
            assertions: FieldPatch::Omit,
            udp: FieldPatch::Omit,
            tags: FieldPatch::Omit,
            contacts: FieldPatch::Omit,
        }
    }

    /// Contact ids this request asks the remote to assign.
    pub fn requested_contact_ids(&self) -> Vec<String> {
        match &self.contacts {
            FieldPatch::Set(contacts) => {
                contacts.iter().map(|c| c.contact_id.clone()).collect()
            }
            _ => Vec::new(),
        }
    }
}
