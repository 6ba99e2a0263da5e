use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

pub const DEFAULT_TARGET_VERIFIERS: u32 = 1;
pub const DEFAULT_CAPACITY: u32 = 100;
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Verifiers each report should end up with.
    pub target_verifiers: u32,
    /// Capacity used when the durable volunteer row carries none.
    pub default_capacity: u32,
    /// Upper bound on every lock acquisition and store wait.
    pub io_timeout_ms: u64,
    /// Give back reservations for candidates the store refused to persist,
    /// instead of leaving them for the next resync.
    pub release_unpersisted_reservations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_verifiers: DEFAULT_TARGET_VERIFIERS,
            default_capacity: DEFAULT_CAPACITY,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            release_unpersisted_reservations: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: EngineConfig = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_verifiers == 0 {
            bail!("target_verifiers must be at least 1");
        }
        if self.io_timeout_ms == 0 {
            bail!("io_timeout_ms must be at least 1");
        }
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "target_verifiers": 3 }"#).expect("config should parse");
        assert_eq!(config.target_verifiers, 3);
        assert_eq!(config.default_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.io_timeout(), Duration::from_millis(DEFAULT_IO_TIMEOUT_MS));
    }

    #[test]
    fn zero_target_is_rejected() {
        let config = EngineConfig {
            target_verifiers: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed = serde_json::from_str::<EngineConfig>(r#"{ "verifiers": 2 }"#);
        assert!(parsed.is_err());
    }
}
