//! The monitor variant tag and the user's declared configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    blocks::{AssertionBlock, DnsBlock, SslExpiryBlock, UdpBlock},
    contact::DesiredContact,
    field::Desired,
};

/// The closed set of monitor flavors.
///
/// Exactly one variant applies per monitor and it is immutable after
/// creation; changing it requires replacing the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorVariant {
    /// Plain HTTP(S) availability check.
    Http,
    /// HTTP(S) check with response assertions.
    Keyword,
    /// Passive check expecting periodic pings from the monitored system.
    Heartbeat,
    /// ICMP reachability check.
    Ping,
    /// DNS resolution check.
    Dns,
    /// TCP port check.
    Port,
    /// UDP probe check.
    Udp,
}

/// Which timing field a variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingSemantics {
    /// The variant uses a response timeout, defaulting when omitted.
    Timeout,
    /// The variant uses a grace period between expected heartbeats.
    GracePeriod,
    /// The variant has no timing field; the wire value is a canonical zero.
    None,
}

impl MonitorVariant {
    /// Timing semantics for this variant. Exactly one of timeout and
    /// grace-period is ever legal.
    pub fn timing(&self) -> TimingSemantics {
        match self {
            MonitorVariant::Heartbeat => TimingSemantics::GracePeriod,
            MonitorVariant::Ping | MonitorVariant::Dns => TimingSemantics::None,
            _ => TimingSemantics::Timeout,
        }
    }

    /// Whether the variant performs HTTP requests and accepts method, body,
    /// auth header and SSL expiry settings.
    pub fn is_http_like(&self) -> bool {
        matches!(self, MonitorVariant::Http | MonitorVariant::Keyword)
    }

    /// Whether the variant requires a destination port.
    pub fn requires_port(&self) -> bool {
        matches!(self, MonitorVariant::Port | MonitorVariant::Udp)
    }

    /// Stable lowercase name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorVariant::Http => "http",
            MonitorVariant::Keyword => "keyword",
            MonitorVariant::Heartbeat => "heartbeat",
            MonitorVariant::Ping => "ping",
            MonitorVariant::Dns => "dns",
            MonitorVariant::Port => "port",
            MonitorVariant::Udp => "udp",
        }
    }
}

impl std::fmt::Display for MonitorVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method used by HTTP-like monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP PATCH.
    Patch,
    /// HTTP DELETE.
    Delete,
    /// HTTP HEAD.
    Head,
}

/// The user's declared intent for one monitor.
///
/// `name`, `variant` and `target` are always concrete; every other field is
/// tri-state so that "not mentioned" never collapses into "set to empty".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredMonitor {
    /// Human-readable monitor name.
    pub name: String,
    /// Monitor flavor; immutable after creation.
    pub variant: MonitorVariant,
    /// URL, hostname or address the monitor checks.
    pub target: String,

    /// Check interval in seconds.
    #[serde(default)]
    pub interval: Desired<u32>,
    /// Response timeout in seconds; illegal for heartbeat/ping/dns.
    #[serde(default)]
    pub timeout: Desired<u32>,
    /// Grace period in seconds; heartbeat only.
    #[serde(default)]
    pub grace_period: Desired<u32>,

    /// HTTP method; derived from the body when unspecified.
    #[serde(default)]
    pub http_method: Desired<HttpMethod>,
    /// Structured JSON request body. Mutually exclusive with `form_body`.
    #[serde(default)]
    pub json_body: Desired<serde_json::Value>,
    /// Key/value request body. Mutually exclusive with `json_body`.
    #[serde(default)]
    pub form_body: Desired<BTreeMap<String, String>>,
    /// Authorization header value for HTTP-like variants.
    #[serde(default)]
    pub auth_header: Desired<String>,

    /// Destination port; required for port/udp variants.
    #[serde(default)]
    pub port: Desired<u16>,

    /// SSL certificate expiry alerting; HTTP-like variants only.
    #[serde(default)]
    pub ssl_expiry: Desired<SslExpiryBlock>,
    /// Expected DNS resolution; dns variant only.
    #[serde(default)]
    pub dns: Desired<DnsBlock>,
    /// Response assertions; keyword variant only.
    #[serde(default)]
    pub assertions: Desired<AssertionBlock>,
    /// Probe parameters; udp variant only.
    #[serde(default)]
    pub udp: Desired<UdpBlock>,

    /// Free-form tags; deduplicated and case-folded before transmission.
    #[serde(default)]
    pub tags: Desired<Vec<String>>,
    /// Alert contact assignments.
    #[serde(default)]
    pub contacts: Desired<Vec<DesiredContact>>,
    /// Whether the monitor should be paused.
    #[serde(default)]
    pub paused: Desired<bool>,
}

impl DesiredMonitor {
    /// Creates a configuration managing nothing beyond the mandatory fields.
    pub fn new(name: impl Into<String>, variant: MonitorVariant, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant,
            target: target.into(),
            interval: Desired::Unmanaged,
            timeout: Desired::Unmanaged,
            grace_period: Desired::Unmanaged,
            http_method: Desired::Unmanaged,
            json_body: Desired::Unmanaged,
            form_body: Desired::Unmanaged,
            auth_header: Desired::Unmanaged,
            port: Desired::Unmanaged,
            ssl_expiry: Desired::Unmanaged,
            dns: Desired::Unmanaged,
            assertions: Desired::Unmanaged,
            udp: Desired::Unmanaged,
            tags: Desired::Unmanaged,
            contacts: Desired::Unmanaged,
            paused: Desired::Unmanaged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_semantics_per_variant() {
        assert_eq!(MonitorVariant::Heartbeat.timing(), TimingSemantics::GracePeriod);
        assert_eq!(MonitorVariant::Ping.timing(), TimingSemantics::None);
        assert_eq!(MonitorVariant::Dns.timing(), TimingSemantics::None);
        assert_eq!(MonitorVariant::Http.timing(), TimingSemantics::Timeout);
        assert_eq!(MonitorVariant::Keyword.timing(), TimingSemantics::Timeout);
        assert_eq!(MonitorVariant::Port.timing(), TimingSemantics::Timeout);
        assert_eq!(MonitorVariant::Udp.timing(), TimingSemantics::Timeout);
    }

    #[test]
    fn test_new_manages_nothing_optional() {
        let desired = DesiredMonitor::new("api", MonitorVariant::Http, "https://example.com");
        assert!(desired.interval.is_unmanaged());
        assert!(desired.timeout.is_unmanaged());
        assert!(desired.contacts.is_unmanaged());
        assert!(desired.paused.is_unmanaged());
    }

    #[test]
    fn test_port_requirement() {
        assert!(MonitorVariant::Port.requires_port());
        assert!(MonitorVariant::Udp.requires_port());
        assert!(!MonitorVariant::Http.requires_port());
        assert!(!MonitorVariant::Heartbeat.requires_port());
    }
}
