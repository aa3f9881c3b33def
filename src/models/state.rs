//! Persisted reconciliation state and point-in-time remote observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    blocks::{AssertionBlock, DnsBlock, SslExpiryBlock, UdpBlock},
    contact::{ObservedContact, PersistedContact},
    field::Managed,
    monitor::{HttpMethod, MonitorVariant},
};

/// Remote identifier of a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub String);

impl MonitorId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the monitor is actively checking or paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    /// The monitor is running checks.
    Running,
    /// The monitor is paused.
    Paused,
}

/// The last-known-good snapshot written after a successful reconciliation.
///
/// Owned exclusively by the orchestrator; written all-or-nothing at the end
/// of create, read or update, never partially. The schema version must be
/// checked (and the record migrated) before any other field is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Layout version of this record; see [`crate::migrate`].
    pub schema_version: u32,
    /// Remote monitor id.
    pub id: MonitorId,
    /// Monitor name as last reconciled.
    pub name: String,
    /// Monitor flavor; immutable.
    pub variant: MonitorVariant,
    /// Checked URL, hostname or address.
    pub target: String,

    /// Check interval in seconds.
    pub interval: Managed<u32>,
    /// Response timeout in seconds.
    pub timeout: Managed<u32>,
    /// Heartbeat grace period in seconds.
    pub grace_period: Managed<u32>,
    /// HTTP method.
    pub http_method: Managed<HttpMethod>,
    /// Structured JSON request body.
    pub json_body: Managed<serde_json::Value>,
    /// Key/value request body.
    pub form_body: Managed<BTreeMap<String, String>>,
    /// Authorization header value.
    pub auth_header: Managed<String>,
    /// Destination port.
    pub port: Managed<u16>,
    /// SSL expiry alerting block.
    pub ssl_expiry: Managed<SslExpiryBlock>,
    /// DNS expectation block.
    pub dns: Managed<DnsBlock>,
    /// Response assertion block.
    pub assertions: Managed<AssertionBlock>,
    /// UDP probe block.
    pub udp: Managed<UdpBlock>,
    /// Normalized tag set.
    pub tags: Managed<Vec<String>>,
    /// Alert contact assignments.
    pub contacts: Managed<Vec<PersistedContact>>,
    /// Paused flag.
    pub paused: Managed<bool>,

    /// When this record was last written.
    pub last_synced_at: DateTime<Utc>,
}

/// A snapshot fetched from the remote API at a point in time.
///
/// Transient: consumed to produce a new [`PersistedState`], never stored.
/// May lag behind a just-issued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedMonitor {
    /// Remote monitor id.
    pub id: MonitorId,
    /// Monitor name.
    pub name: String,
    /// Monitor flavor.
    pub variant: MonitorVariant,
    /// Checked URL, hostname or address.
    pub target: String,
    /// Check interval in seconds.
    pub interval: u32,
    /// Response timeout; absent when cleared or not applicable.
    pub timeout: Option<u32>,
    /// Heartbeat grace period; absent when not applicable.
    pub grace_period: Option<u32>,
    /// HTTP method; absent for non-HTTP variants.
    pub http_method: Option<HttpMethod>,
    /// Structured JSON request body.
    pub json_body: Option<serde_json::Value>,
    /// Key/value request body.
    pub form_body: Option<BTreeMap<String, String>>,
    /// Authorization header value.
    pub auth_header: Option<String>,
    /// Destination port.
    pub port: Option<u16>,
    /// SSL expiry alerting block.
    pub ssl_expiry: Option<SslExpiryBlock>,
    /// DNS expectation block.
    pub dns: Option<DnsBlock>,
    /// Response assertion block.
    pub assertions: Option<AssertionBlock>,
    /// UDP probe block.
    pub udp: Option<UdpBlock>,
    /// Tags as reported by the remote; casing is not canonical.
    pub tags: Vec<String>,
    /// Assigned alert contacts.
    pub contacts: Vec<ObservedContact>,
    /// Run/pause status.
    pub status: MonitorStatus,
}
