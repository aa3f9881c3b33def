//! Alert contact assignments.
//!
//! Contacts are a many-to-many relationship between monitors and externally
//! managed contact ids, materialized as an owned, unordered collection on the
//! monitor. Ids are unique within one monitor's collection.

use serde::{Deserialize, Serialize};

use crate::models::field::Desired;

/// A declared contact assignment.
///
/// Both delay parameters are mandatory on the remote API, so the request
/// builder rejects assignments whose delays are still unknown at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredContact {
    /// Externally managed contact id.
    pub contact_id: String,
    /// Seconds to wait before the first notification.
    pub notify_delay: Desired<u32>,
    /// Seconds between repeated notifications; zero disables repeats.
    pub repeat_interval: Desired<u32>,
}

/// A contact assignment as recorded in persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedContact {
    /// Externally managed contact id.
    pub contact_id: String,
    /// Seconds to wait before the first notification.
    pub notify_delay: u32,
    /// Seconds between repeated notifications; zero disables repeats.
    pub repeat_interval: u32,
}

/// A contact assignment as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedContact {
    /// Externally managed contact id.
    pub contact_id: String,
    /// Seconds to wait before the first notification.
    pub notify_delay: u32,
    /// Seconds between repeated notifications; zero disables repeats.
    pub repeat_interval: u32,
}

impl From<&ObservedContact> for PersistedContact {
    fn from(observed: &ObservedContact) -> Self {
        Self {
            contact_id: observed.contact_id.clone(),
            notify_delay: observed.notify_delay,
            repeat_interval: observed.repeat_interval,
        }
    }
}
