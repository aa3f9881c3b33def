//! Schema migrations for persisted state.
//!
//! Persisted records carry a monotonically increasing `schema_version`. A
//! record at version N only ever moves to N+1 through a pure upgrader; the
//! chain is registered at construction time and applied as a fold before any
//! other field of an old record is read.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::state::PersistedState;

/// Version written by the current layout.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Errors raised while migrating a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// The record is structurally corrupt. Surfaced, never silently
    /// repaired by dropping fields.
    #[error("persisted state is corrupt at version {version}: {detail}")]
    Corrupt {
        /// Version the record claimed when the corruption was found.
        version: u32,
        /// What was wrong.
        detail: String,
    },

    /// The record was written by a newer layout than this build supports.
    #[error("persisted state version {found} is newer than supported version {supported}")]
    FutureVersion {
        /// Version recorded in the state.
        found: u32,
        /// Newest version this build understands.
        supported: u32,
    },
}

type UpgradeFn = fn(Value) -> Result<Value, MigrationError>;

/// The ordered chain of schema upgraders.
pub struct MigrationChain {
    upgraders: Vec<(u32, UpgradeFn)>,
}

impl Default for MigrationChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationChain {
    /// Builds the chain with every known upgrader registered.
    pub fn new() -> Self {
        Self { upgraders: vec![(0, upgrade_v0_to_v1), (1, upgrade_v1_to_v2)] }
    }

    /// Brings a raw persisted record up to the current layout and
    /// deserializes it.
    ///
    /// Applying the chain to an already-current record only revalidates it,
    /// so repeated migration is idempotent.
    pub fn apply(&self, mut raw: Value) -> Result<PersistedState, MigrationError> {
        let version = read_version(&raw)?;
        if version > CURRENT_SCHEMA_VERSION {
            return Err(MigrationError::FutureVersion {
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        for (from, upgrade) in &self.upgraders {
            if *from < version {
                continue;
            }
            tracing::debug!(from = *from, to = *from + 1, "migrating persisted state");
            raw = upgrade(raw)?;
            let object = as_object_mut(&mut raw, *from)?;
            object.insert("schema_version".to_string(), json!(*from + 1));
        }

        serde_json::from_value(raw).map_err(|e| MigrationError::Corrupt {
            version: CURRENT_SCHEMA_VERSION,
            detail: e.to_string(),
        })
    }
}

/// Migrates a raw persisted record with the default chain.
pub fn migrate(raw: Value) -> Result<PersistedState, MigrationError> {
    MigrationChain::new().apply(raw)
}

fn read_version(raw: &Value) -> Result<u32, MigrationError> {
    let version = raw
        .get("schema_version")
        .and_then(Value::as_u64)
        .ok_or_else(|| MigrationError::Corrupt {
            version: 0,
            detail: "missing or non-integer schema_version".to_string(),
        })?;
    u32::try_from(version).map_err(|_| MigrationError::Corrupt {
        version: 0,
        detail: format!("schema_version {version} out of range"),
    })
}

fn as_object_mut(raw: &mut Value, version: u32) -> Result<&mut Map<String, Value>, MigrationError> {
    raw.as_object_mut().ok_or(MigrationError::Corrupt {
        version,
        detail: "record is not a JSON object".to_string(),
    })
}

fn unmanaged() -> Value {
    json!({ "state": "unmanaged" })
}

/// Reads the `value` array of a tagged managed field, if the field holds one.
fn managed_value_array<'a>(
    object: &'a Map<String, Value>,
    field: &str,
) -> Option<&'a Vec<Value>> {
    let entry = object.get(field)?;
    if entry.get("state")?.as_str()? != "value" {
        return None;
    }
    entry.get("value")?.as_array()
}

/// v0 -> v1: collection fields became unordered and deduplicated.
///
/// Tags were stored in declaration order with duplicates and original
/// casing; contacts could repeat an id. Output is sorted so re-running the
/// upgrader is a no-op.
fn upgrade_v0_to_v1(mut raw: Value) -> Result<Value, MigrationError> {
    let object = as_object_mut(&mut raw, 0)?;

    if let Some(values) = managed_value_array(object, "tags") {
        let mut tags = Vec::with_capacity(values.len());
        for value in values {
            let tag = value.as_str().ok_or(MigrationError::Corrupt {
                version: 0,
                detail: "non-string tag".to_string(),
            })?;
            tags.push(tag.to_string());
        }
        let normalized = crate::merge::normalize_strings(&tags);
        object.insert("tags".to_string(), json!({ "state": "value", "value": normalized }));
    }

    if let Some(values) = managed_value_array(object, "contacts") {
        let mut seen: Vec<String> = Vec::new();
        let mut contacts: Vec<Value> = Vec::new();
        for value in values {
            let id = value
                .get("contact_id")
                .and_then(Value::as_str)
                .ok_or(MigrationError::Corrupt {
                    version: 0,
                    detail: "contact without contact_id".to_string(),
                })?;
            if seen.iter().any(|s| s == id) {
                continue;
            }
            seen.push(id.to_string());
            contacts.push(value.clone());
        }
        contacts.sort_by_key(|c| {
            c.get("contact_id").and_then(Value::as_str).unwrap_or_default().to_string()
        });
        object.insert("contacts".to_string(), json!({ "state": "value", "value": contacts }));
    }

    Ok(raw)
}

/// v1 -> v2: timing fields split per variant, new fields introduced.
///
/// Heartbeat monitors used to store their grace period in `timeout`; it
/// moves to the new `grace_period` field. The `auth_header` and `udp` fields
/// did not exist and default to unmanaged, never to a guessed value, so the
/// next reconciliation treats them as not yet adopted.
fn upgrade_v1_to_v2(mut raw: Value) -> Result<Value, MigrationError> {
    let object = as_object_mut(&mut raw, 1)?;

    let is_heartbeat =
        object.get("variant").and_then(Value::as_str) == Some("heartbeat");
    if is_heartbeat {
        let timeout = object.get("timeout").cloned().unwrap_or_else(unmanaged);
        object.insert("grace_period".to_string(), timeout);
        object.insert("timeout".to_string(), unmanaged());
    } else {
        object.entry("grace_period").or_insert_with(unmanaged);
    }

    object.entry("auth_header").or_insert_with(unmanaged);
    object.entry("udp").or_insert_with(unmanaged);

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::Managed;

    fn sample_v0(variant: &str) -> Value {
        json!({
            "schema_version": 0,
            "id": "m1",
            "name": "legacy",
            "variant": variant,
            "target": "https://example.com",
            "interval": { "state": "value", "value": 300 },
            "timeout": { "state": "value", "value": 45 },
            "http_method": { "state": "unmanaged" },
            "json_body": { "state": "unmanaged" },
            "form_body": { "state": "unmanaged" },
            "port": { "state": "unmanaged" },
            "ssl_expiry": { "state": "unmanaged" },
            "dns": { "state": "unmanaged" },
            "assertions": { "state": "unmanaged" },
            "tags": { "state": "value", "value": ["Prod", "prod", "API"] },
            "contacts": { "state": "value", "value": [
                { "contact_id": "c2", "notify_delay": 0, "repeat_interval": 0 },
                { "contact_id": "c1", "notify_delay": 5, "repeat_interval": 60 },
                { "contact_id": "c2", "notify_delay": 9, "repeat_interval": 9 }
            ] },
            "paused": { "state": "unmanaged" },
            "last_synced_at": "2023-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_v0_collections_are_normalized() {
        let state = migrate(sample_v0("http")).unwrap();
        assert_eq!(state.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(state.tags, Managed::Value(vec!["api".to_string(), "prod".to_string()]));
        let contacts = state.contacts.as_value().unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].contact_id, "c1");
        assert_eq!(contacts[1].contact_id, "c2");
        // First occurrence wins when an id repeats.
        assert_eq!(contacts[1].notify_delay, 0);
    }

    #[test]
    fn test_heartbeat_timeout_moves_to_grace_period() {
        let state = migrate(sample_v0("heartbeat")).unwrap();
        assert_eq!(state.grace_period, Managed::Value(45));
        assert_eq!(state.timeout, Managed::Unmanaged);
    }

    #[test]
    fn test_new_fields_default_to_unmanaged() {
        let state = migrate(sample_v0("http")).unwrap();
        assert_eq!(state.auth_header, Managed::Unmanaged);
        assert_eq!(state.udp, Managed::Unmanaged);
        assert_eq!(state.grace_period, Managed::Unmanaged);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let once = migrate(sample_v0("http")).unwrap();
        let raw_again = serde_json::to_value(&once).unwrap();
        let twice = migrate(raw_again).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_future_version_is_rejected() {
        let raw = json!({ "schema_version": CURRENT_SCHEMA_VERSION + 1 });
        assert_eq!(
            migrate(raw).unwrap_err(),
            MigrationError::FutureVersion {
                found: CURRENT_SCHEMA_VERSION + 1,
                supported: CURRENT_SCHEMA_VERSION,
            }
        );
    }

    #[test]
    fn test_missing_version_is_corrupt() {
        let err = migrate(json!({ "name": "no version" })).unwrap_err();
        assert!(matches!(err, MigrationError::Corrupt { version: 0, .. }));
    }

    #[test]
    fn test_oversized_version_is_corrupt_not_truncated() {
        // A version past u32 must not wrap around into a valid one.
        let raw = json!({ "schema_version": u64::from(u32::MAX) + 1 + u64::from(CURRENT_SCHEMA_VERSION) });
        let err = migrate(raw).unwrap_err();
        assert!(matches!(err, MigrationError::Corrupt { version: 0, .. }));
    }

    #[test]
    fn test_non_string_tag_is_corrupt_not_dropped() {
        let mut raw = sample_v0("http");
        raw["tags"] = json!({ "state": "value", "value": ["ok", 7] });
        let err = migrate(raw).unwrap_err();
        assert!(matches!(err, MigrationError::Corrupt { version: 0, .. }));
    }
}
