//! Optional nested configuration blocks.
//!
//! A block's presence or absence is itself meaningful, independently of its
//! children: an unmanaged block leaves the remote alone, a cleared block
//! removes the remote sub-object, and a present block manages every child.

use serde::{Deserialize, Serialize};

/// SSL certificate expiry alerting for HTTP-like monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslExpiryBlock {
    /// Days before certificate expiry at which to alert.
    pub alert_before_days: u32,
}

/// The DNS record type a DNS monitor resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    /// IPv4 address record.
    A,
    /// IPv6 address record.
    Aaaa,
    /// Canonical name record.
    Cname,
    /// Mail exchange record.
    Mx,
    /// Text record.
    Txt,
}

/// Expected DNS resolution for a DNS monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsBlock {
    /// The record type to resolve.
    pub record_type: DnsRecordType,
    /// Values the resolution must contain. Compared case-insensitively.
    pub expected_values: Vec<String>,
}

/// Where an API assertion reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionSource {
    /// The HTTP status code.
    StatusCode,
    /// A header value, addressed by the assertion target.
    Header,
    /// The response body.
    Body,
}

/// How an assertion compares its source against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionComparison {
    /// Source equals target.
    Equals,
    /// Source differs from target.
    NotEquals,
    /// Source contains target as a substring.
    Contains,
    /// Source does not contain target.
    NotContains,
}

/// A single response assertion for keyword/API monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// Input the assertion reads.
    pub source: AssertionSource,
    /// Comparison operator.
    pub comparison: AssertionComparison,
    /// Value compared against.
    pub target: String,
}

/// Response assertions for keyword/API monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionBlock {
    /// Assertions evaluated against each response.
    pub assertions: Vec<Assertion>,
}

/// Probe parameters for UDP monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpBlock {
    /// Destination port of the probe.
    pub port: u16,
    /// Payload sent with each probe.
    pub send_payload: String,
}
