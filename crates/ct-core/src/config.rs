//! Engine configuration
//!
//! Defaults are compiled in. Hosts may pass overrides as JSON, e.g.
//! `{"retry": {"maxAttempts": 5}, "navigationDebounceMs": 50}`; missing
//! fields keep their defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::controller::RetryPolicy;

/// Tunables for the orchestrator and its controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    /// Delay between a detected navigation and its apply pass
    #[serde(rename = "navigationDebounceMs", with = "millis")]
    pub navigation_debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            navigation_debounce: Duration::from_millis(150),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Durations as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.interval, Duration::from_millis(500));
        assert_eq!(config.navigation_debounce, Duration::from_millis(150));
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json(r#"{"retry": {"maxAttempts": 3}, "navigationDebounceMs": 40}"#).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.interval, Duration::from_millis(500));
        assert_eq!(config.navigation_debounce, Duration::from_millis(40));
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }
}
