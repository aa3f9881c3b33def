//! Upgrading an old persisted record must land on the same state a fresh
//! reconciliation of the equivalent declaration would write today.

use serde_json::{json, Value};

use vigil::{
    migrate::migrate,
    models::monitor::MonitorVariant,
    test_helpers::{contact, DesiredMonitorBuilder},
};

/// A record as the v0 layout wrote it: tags in declaration order with
/// duplicates, contacts unsorted with a repeated id, heartbeat grace period
/// stored in `timeout`, no `grace_period`/`auth_header`/`udp` fields.
fn legacy_heartbeat_record() -> Value {
    json!({
        "schema_version": 0,
        "id": "m1",
        "name": "test-monitor",
        "variant": "heartbeat",
        "target": "example.com",
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
fn test_migrated_record_matches_fresh_create_of_equivalent_declaration() {
    let migrated = migrate(legacy_heartbeat_record()).expect("chain must succeed");

    let mut fresh = DesiredMonitorBuilder::new(MonitorVariant::Heartbeat)
        .interval(300)
        .grace_period(45)
        .tags(&["Prod", "prod", "API"])
        .contacts(vec![contact("c2", 0, 0), contact("c1", 5, 60)])
        .build_state("m1");

    // Sync timestamps are bookkeeping, not configuration.
    fresh.last_synced_at = migrated.last_synced_at;

    assert_eq!(migrated, fresh);
}

#[test]
fn test_migrated_http_record_keeps_its_timeout() {
    let mut raw = legacy_heartbeat_record();
    raw["variant"] = json!("http");
    raw["target"] = json!("https://example.com");
    let mut migrated = migrate(raw).expect("chain must succeed");

    let mut fresh = DesiredMonitorBuilder::new(MonitorVariant::Http)
        .interval(300)
        .timeout(45)
        .tags(&["Prod", "prod", "API"])
        .contacts(vec![contact("c2", 0, 0), contact("c1", 5, 60)])
        .build_state("m1");

    fresh.last_synced_at = migrated.last_synced_at;
    // An http declaration always settles the derived method into state; the
    // legacy record never managed it. That is the one intended difference.
    migrated.http_method = fresh.http_method.clone();

    assert_eq!(migrated, fresh);
}
