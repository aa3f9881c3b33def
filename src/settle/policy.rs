//! Settle retry policy.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_backoff_floor() -> Duration {
    Duration::from_millis(500)
}

fn default_backoff_ceiling() -> Duration {
    Duration::from_secs(3)
}

fn default_required_matches() -> u32 {
    2
}

/// Bounds for the settle poll loop.
///
/// The counts and durations are tunables, not invariants: several
/// consecutive matches guard against momentary races on server-side rebuilt
/// collections, and the specific numbers carry no further meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlePolicy {
    /// Maximum time to wait for convergence. The caller's deadline still
    /// applies on top of this.
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration_from_seconds")]
    pub timeout: Duration,
    /// Initial interval between polls.
    #[serde(
        default = "default_backoff_floor",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub backoff_floor: Duration,
    /// Interval the geometric backoff never exceeds.
    #[serde(
        default = "default_backoff_ceiling",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub backoff_ceiling: Duration,
    /// Consecutive matching polls required before declaring convergence.
    #[serde(default = "default_required_matches")]
    pub required_matches: u32,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            backoff_floor: default_backoff_floor(),
            backoff_ceiling: default_backoff_ceiling(),
            required_matches: default_required_matches(),
        }
    }
}

impl SettlePolicy {
    /// Tighter policy for settling the run/pause toggle, which converges
    /// faster than full-field settling.
    pub fn pause_default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            backoff_floor: Duration::from_millis(250),
            backoff_ceiling: Duration::from_secs(2),
            required_matches: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = SettlePolicy::default();
        assert_eq!(policy.backoff_floor, Duration::from_millis(500));
        assert_eq!(policy.backoff_ceiling, Duration::from_secs(3));
        assert_eq!(policy.required_matches, 2);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let policy: SettlePolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, SettlePolicy::default());
    }

    #[test]
    fn test_deserialize_overrides_units() {
        let policy: SettlePolicy = serde_json::from_str(
            r#"{"timeout": 10, "backoff_floor": 100, "backoff_ceiling": 1, "required_matches": 4}"#,
        )
        .unwrap();
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.backoff_floor, Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling, Duration::from_secs(1));
        assert_eq!(policy.required_matches, 4);
    }
}
