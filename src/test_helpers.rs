//! A set of helpers for testing: fluent builders for declared and observed
//! monitors, plus in-memory stand-ins for the remote API.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    client::{ApiError, FieldPatch, MonitorApi, MonitorRequest},
    merge::assemble_after_write,
    models::{
        blocks::{Assertion, AssertionBlock, AssertionComparison, AssertionSource},
        contact::{DesiredContact, ObservedContact},
        field::Desired,
        monitor::{DesiredMonitor, HttpMethod, MonitorVariant},
        state::{MonitorId, MonitorStatus, ObservedMonitor, PersistedState},
    },
    request::build_create,
};

/// Shorthand for a fully-known contact assignment.
pub fn contact(id: &str, notify_delay: u32, repeat_interval: u32) -> DesiredContact {
    DesiredContact {
        contact_id: id.to_string(),
        notify_delay: Desired::Value(notify_delay),
        repeat_interval: Desired::Value(repeat_interval),
    }
}

/// A builder for `DesiredMonitor` instances for testing.
#[derive(Debug, Clone)]
pub struct DesiredMonitorBuilder {
    desired: DesiredMonitor,
}

impl DesiredMonitorBuilder {
    /// Creates a builder with a variant-appropriate default target.
    pub fn new(variant: MonitorVariant) -> Self {
        let target = if variant.is_http_like() { "https://example.com" } else { "example.com" };
        Self { desired: DesiredMonitor::new("test-monitor", variant, target) }
    }

    /// Sets the monitor name.
    pub fn name(mut self, name: &str) -> Self {
        self.desired.name = name.to_string();
        self
    }

    /// Declares the check interval.
    pub fn interval(mut self, seconds: u32) -> Self {
        self.desired.interval = Desired::Value(seconds);
        self
    }

    /// Declares the response timeout.
    pub fn timeout(mut self, seconds: u32) -> Self {
        self.desired.timeout = Desired::Value(seconds);
        self
    }

    /// Declares the heartbeat grace period.
    pub fn grace_period(mut self, seconds: u32) -> Self {
        self.desired.grace_period = Desired::Value(seconds);
        self
    }

    /// Declares the HTTP method.
    pub fn http_method(mut self, method: HttpMethod) -> Self {
        self.desired.http_method = Desired::Value(method);
        self
    }

    /// Declares a structured JSON body.
    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.desired.json_body = Desired::Value(body);
        self
    }

    /// Declares a key/value body.
    pub fn form_body(mut self, pairs: &[(&str, &str)]) -> Self {
        self.desired.form_body = Desired::Value(
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        );
        self
    }

    /// Declares an authorization header value.
    pub fn auth_header(mut self, value: &str) -> Self {
        self.desired.auth_header = Desired::Value(value.to_string());
        self
    }

    /// Declares the destination port.
    pub fn port(mut self, port: u16) -> Self {
        self.desired.port = Desired::Value(port);
        self
    }

    /// Declares tags, verbatim.
    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.desired.tags = Desired::Value(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Declares contact assignments.
    pub fn contacts(mut self, contacts: Vec<DesiredContact>) -> Self {
        self.desired.contacts = Desired::Value(contacts);
        self
    }

    /// Declares a single body-contains assertion.
    pub fn assertions_simple(mut self, needle: &str) -> Self {
        self.desired.assertions = Desired::Value(AssertionBlock {
            assertions: vec![Assertion {
                source: AssertionSource::Body,
                comparison: AssertionComparison::Contains,
                target: needle.to_string(),
            }],
        });
        self
    }

    /// Declares the paused flag.
    pub fn paused(mut self, paused: bool) -> Self {
        self.desired.paused = Desired::Value(paused);
        self
    }

    /// Builds the declared configuration.
    pub fn build(self) -> DesiredMonitor {
        self.desired
    }

    /// Builds the persisted state a clean create of this declaration would
    /// produce, against a remote that echoes requests faithfully.
    pub fn build_state(self, id: &str) -> PersistedState {
        let desired = self.desired;
        let built = build_create(&desired).expect("declaration must be valid");
        let status = match desired.paused {
            Desired::Value(true) => MonitorStatus::Paused,
            _ => MonitorStatus::Running,
        };
        let observed = observed_from_request(id, &built.request, status);
        assemble_after_write(&desired, &built.request, &observed)
    }
}

/// A builder for `ObservedMonitor` snapshots for testing.
#[derive(Debug, Clone)]
pub struct ObservedMonitorBuilder {
    observed: ObservedMonitor,
}

impl ObservedMonitorBuilder {
    /// Creates a builder with plain defaults.
    pub fn new(id: &str, variant: MonitorVariant) -> Self {
        Self {
            observed: ObservedMonitor {
                id: MonitorId::new(id),
                name: "test-monitor".to_string(),
                variant,
                target: if variant.is_http_like() {
                    "https://example.com".to_string()
                } else {
                    "example.com".to_string()
                },
                interval: 300,
                timeout: None,
                grace_period: None,
                http_method: None,
                json_body: None,
                form_body: None,
                auth_header: None,
                port: None,
                ssl_expiry: None,
                dns: None,
                assertions: None,
                udp: None,
                tags: Vec::new(),
                contacts: Vec::new(),
                status: MonitorStatus::Running,
            },
        }
    }

    /// Sets the reported name.
    pub fn name(mut self, name: &str) -> Self {
        self.observed.name = name.to_string();
        self
    }

    /// Sets the reported interval.
    pub fn interval(mut self, seconds: u32) -> Self {
        self.observed.interval = seconds;
        self
    }

    /// Sets the reported timeout.
    pub fn timeout(mut self, seconds: u32) -> Self {
        self.observed.timeout = Some(seconds);
        self
    }

    /// Sets the reported grace period.
    pub fn grace_period(mut self, seconds: u32) -> Self {
        self.observed.grace_period = Some(seconds);
        self
    }

    /// Sets the reported HTTP method.
    pub fn http_method(mut self, method: HttpMethod) -> Self {
        self.observed.http_method = Some(method);
        self
    }

    /// Sets the reported tags, verbatim.
    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.observed.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Sets the reported contacts.
    pub fn contacts(mut self, contacts: Vec<ObservedContact>) -> Self {
        self.observed.contacts = contacts;
        self
    }

    /// Sets the reported status.
    pub fn status(mut self, status: MonitorStatus) -> Self {
        self.observed.status = status;
        self
    }

    /// Builds the snapshot.
    pub fn build(self) -> ObservedMonitor {
        self.observed
    }
}

fn apply_option<T: Clone>(slot: &mut Option<T>, patch: &FieldPatch<T>) {
    match patch {
        FieldPatch::Omit => {}
        FieldPatch::Clear => *slot = None,
        FieldPatch::Set(v) => *slot = Some(v.clone()),
    }
}

/// Applies a request to a snapshot the way a faithful remote would.
pub fn apply_request(observed: &mut ObservedMonitor, request: &MonitorRequest) {
    observed.name = request.name.clone();
    observed.target = request.target.clone();
    if let FieldPatch::Set(v) = &request.interval {
        observed.interval = *v;
    }
    apply_option(&mut observed.timeout, &request.timeout);
    apply_option(&mut observed.grace_period, &request.grace_period);
    apply_option(&mut observed.http_method, &request.http_method);
    apply_option(&mut observed.json_body, &request.json_body);
    apply_option(&mut observed.form_body, &request.form_body);
    apply_option(&mut observed.auth_header, &request.auth_header);
    apply_option(&mut observed.port, &request.port);
    apply_option(&mut observed.ssl_expiry, &request.ssl_expiry);
    apply_option(&mut observed.dns, &request.dns);
    apply_option(&mut observed.assertions, &request.assertions);
    apply_option(&mut observed.udp, &request.udp);
    match &request.tags {
        FieldPatch::Omit => {}
        FieldPatch::Clear => observed.tags = Vec::new(),
        FieldPatch::Set(tags) => observed.tags = tags.clone(),
    }
    match &request.contacts {
        FieldPatch::Omit => {}
        FieldPatch::Clear => observed.contacts = Vec::new(),
        FieldPatch::Set(contacts) => {
            observed.contacts = contacts
                .iter()
                .map(|c| ObservedContact {
                    contact_id: c.contact_id.clone(),
                    notify_delay: c.notify_delay,
                    repeat_interval: c.repeat_interval,
                })
                .collect();
        }
    }
}

/// The snapshot a faithful remote would report right after applying
/// `request` to a fresh monitor.
pub fn observed_from_request(
    id: &str,
    request: &MonitorRequest,
    status: MonitorStatus,
) -> ObservedMonitor {
    let mut observed =
        ObservedMonitorBuilder::new(id, request.variant).name(&request.name).build();
    apply_request(&mut observed, request);
    observed.status = status;
    observed
}

/// A remote API fake that answers `get` from a fixed script.
///
/// The last scripted answer repeats forever, so a script can end in either a
/// stable converged snapshot or a permanently diverged one.
pub struct ScriptedApi {
    gets: Mutex<VecDeque<Result<ObservedMonitor, ApiError>>>,
    get_calls: Mutex<u32>,
}

impl ScriptedApi {
    /// Creates a fake with the given `get` script.
    pub fn new(gets: Vec<Result<ObservedMonitor, ApiError>>) -> Self {
        Self { gets: Mutex::new(gets.into()), get_calls: Mutex::new(0) }
    }

    /// How many times `get` was called.
    pub fn get_calls(&self) -> u32 {
        *self.get_calls.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl MonitorApi for ScriptedApi {
    async fn create(&self, _request: &MonitorRequest) -> Result<ObservedMonitor, ApiError> {
        Err(ApiError::Transport("create is not scripted".to_string()))
    }

    async fn get(&self, _id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        *self.get_calls.lock().expect("lock poisoned") += 1;
        let mut gets = self.gets.lock().expect("lock poisoned");
        match gets.len() {
            0 => Err(ApiError::Transport("get script exhausted".to_string())),
            1 => gets.front().expect("non-empty").clone(),
            _ => gets.pop_front().expect("non-empty"),
        }
    }

    async fn update(
        &self,
        _id: &MonitorId,
        _request: &MonitorRequest,
    ) -> Result<ObservedMonitor, ApiError> {
        Err(ApiError::Transport("update is not scripted".to_string()))
    }

    async fn delete(&self, _id: &MonitorId) -> Result<(), ApiError> {
        Err(ApiError::Transport("delete is not scripted".to_string()))
    }

    async fn pause(&self, _id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        Err(ApiError::Transport("pause is not scripted".to_string()))
    }

    async fn start(&self, _id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        Err(ApiError::Transport("start is not scripted".to_string()))
    }
}

struct FakeRemoteInner {
    current: Option<ObservedMonitor>,
    /// What `get` reports while the visibility lag has not drained. `None`
    /// means the monitor is not visible at all.
    stale: Option<ObservedMonitor>,
    lag_remaining: u32,
    visibility_lag: u32,
    next_id: u32,
}

/// An in-memory remote that applies requests faithfully, with optional
/// eventual-consistency lag and optional silent dropping of contacts.
pub struct FakeRemote {
    inner: Mutex<FakeRemoteInner>,
    drop_contact_ids: Vec<String>,
}

impl FakeRemote {
    /// A remote whose writes are immediately visible.
    pub fn new() -> Self {
        Self::with_visibility_lag(0)
    }

    /// A remote whose writes only become visible after `lag` reads.
    pub fn with_visibility_lag(lag: u32) -> Self {
        Self {
            inner: Mutex::new(FakeRemoteInner {
                current: None,
                stale: None,
                lag_remaining: 0,
                visibility_lag: lag,
                next_id: 1,
            }),
            drop_contact_ids: Vec::new(),
        }
    }

    /// Makes the remote silently drop the given contact ids from every
    /// request, simulating partial application.
    pub fn dropping_contacts(mut self, ids: &[&str]) -> Self {
        self.drop_contact_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Changes the visibility lag applied to subsequent writes.
    pub fn set_visibility_lag(&self, lag: u32) {
        self.inner.lock().expect("lock poisoned").visibility_lag = lag;
    }

    fn begin_write(inner: &mut FakeRemoteInner) {
        inner.stale = inner.current.clone();
        inner.lag_remaining = inner.visibility_lag;
    }

    fn drop_contacts(&self, observed: &mut ObservedMonitor) {
        observed.contacts.retain(|c| !self.drop_contact_ids.contains(&c.contact_id));
    }
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MonitorApi for FakeRemote {
    async fn create(&self, request: &MonitorRequest) -> Result<ObservedMonitor, ApiError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        Self::begin_write(&mut inner);
        let id = format!("monitor-{}", inner.next_id);
        inner.next_id += 1;
        let mut observed = observed_from_request(&id, request, MonitorStatus::Running);
        self.drop_contacts(&mut observed);
        inner.current = Some(observed.clone());
        Ok(observed)
    }

    async fn get(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let view = if inner.lag_remaining > 0 {
            inner.lag_remaining -= 1;
            inner.stale.clone()
        } else {
            inner.current.clone()
        };
        match view {
            Some(observed) if &observed.id == id => Ok(observed),
            _ => Err(ApiError::NotFound),
        }
    }

    async fn update(
        &self,
        id: &MonitorId,
        request: &MonitorRequest,
    ) -> Result<ObservedMonitor, ApiError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let Some(current) = inner.current.clone().filter(|m| &m.id == id) else {
            return Err(ApiError::NotFound);
        };
        Self::begin_write(&mut inner);
        let mut observed = current;
        apply_request(&mut observed, request);
        self.drop_contacts(&mut observed);
        inner.current = Some(observed.clone());
        Ok(observed)
    }

    async fn delete(&self, id: &MonitorId) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.current.as_ref().map(|m| &m.id) != Some(id) {
            return Err(ApiError::NotFound);
        }
        Self::begin_write(&mut inner);
        inner.current = None;
        Ok(())
    }

    async fn pause(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let Some(mut observed) = inner.current.clone().filter(|m| &m.id == id) else {
            return Err(ApiError::NotFound);
        };
        Self::begin_write(&mut inner);
        observed.status = MonitorStatus::Paused;
        inner.current = Some(observed.clone());
        Ok(observed)
    }

    async fn start(&self, id: &MonitorId) -> Result<ObservedMonitor, ApiError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let Some(mut observed) = inner.current.clone().filter(|m| &m.id == id) else {
            return Err(ApiError::NotFound);
        };
        Self::begin_write(&mut inner);
        observed.status = MonitorStatus::Running;
        inner.current = Some(observed.clone());
        Ok(observed)
    }
}
