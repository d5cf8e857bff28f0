//! Engine-side configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum delegation chain depth followed by `effective_power`.
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 8;

/// Governance engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Delegation hops counted when resolving effective power
    pub max_delegation_depth: usize,
    /// Deadline scheduler
    pub scheduler: SchedulerConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            max_delegation_depth: DEFAULT_MAX_DELEGATION_DEPTH,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl GovernanceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_delegation_depth == 0 {
            return Err("max_delegation_depth must be at least 1".to_string());
        }
        self.scheduler.validate()
    }
}

/// Deadline scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    /// Settlement attempts per proposal per tick before alerting
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            max_attempts: 5,
            base_backoff_ms: 200,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Exponential backoff before retry number `attempt` (1-based), capped
    /// at 64x the base.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(6);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be positive".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GovernanceConfig::default();
        assert_eq!(config.max_delegation_depth, 8);
        assert_eq!(config.scheduler.tick_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = SchedulerConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(2), Duration::from_millis(400));
        assert_eq!(config.backoff(3), Duration::from_millis(800));
        assert_eq!(config.backoff(50), Duration::from_millis(200 * 64));
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = GovernanceConfig {
            max_delegation_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: GovernanceConfig =
            serde_json::from_str(r#"{"scheduler":{"max_attempts":2}}"#).unwrap();
        assert_eq!(config.max_delegation_depth, 8);
        assert_eq!(config.scheduler.max_attempts, 2);
        assert_eq!(config.scheduler.base_backoff_ms, 200);
    }
}
