//! Engine configuration.
//!
//! Loaded from JSON by the host; every field but `own_app_id` has a default.

use crate::error::ConfigError;
use applock_detect::{ExclusionFilter, SamplerConfig, DEFAULT_EXCLUDED_PREFIXES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound on the sampler interval.
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identifier of the app-lock application itself. Never locked.
    pub own_app_id: String,

    /// Identifier prefixes that never trigger (shell, launcher).
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,

    /// Time between sampler ticks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Trailing window for the usage-ranking query.
    #[serde(default = "default_usage_window_ms")]
    pub usage_window_ms: u64,

    /// Grace applied when `grant_unlock` is called without a duration.
    #[serde(default = "default_grace_ms")]
    pub default_grace_ms: u64,
}

fn default_excluded_prefixes() -> Vec<String> {
    DEFAULT_EXCLUDED_PREFIXES.iter().map(|p| p.to_string()).collect()
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_usage_window_ms() -> u64 {
    5_000
}

fn default_grace_ms() -> u64 {
    3_000
}

impl EngineConfig {
    pub fn new(own_app_id: impl Into<String>) -> Self {
        Self {
            own_app_id: own_app_id.into(),
            excluded_prefixes: default_excluded_prefixes(),
            poll_interval_ms: default_poll_interval_ms(),
            usage_window_ms: default_usage_window_ms(),
            default_grace_ms: default_grace_ms(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.own_app_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "own_app_id",
                message: "must not be empty".to_string(),
            });
        }
        if !(1..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                message: format!("must be between 1 and {MAX_POLL_INTERVAL_MS}"),
            });
        }
        if self.usage_window_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "usage_window_ms",
                message: "must be positive".to_string(),
            });
        }
        if self.default_grace_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "default_grace_ms",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn exclusion_filter(&self) -> ExclusionFilter {
        ExclusionFilter::new(self.own_app_id.as_str(), self.excluded_prefixes.iter().cloned())
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            window: Duration::from_millis(self.usage_window_ms),
        }
    }

    pub fn default_grace(&self) -> Duration {
        Duration::from_millis(self.default_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config =
            EngineConfig::from_json_str(r#"{"own_app_id": "com.example.applock"}"#).unwrap();
        assert_eq!(config, EngineConfig::new("com.example.applock"));
        assert_eq!(config.default_grace(), Duration::from_millis(3000));
        assert_eq!(config.sampler_config(), SamplerConfig::default());
    }

    #[test]
    fn test_exclusion_filter_uses_configured_prefixes() {
        let mut config = EngineConfig::new("com.example.applock");
        config.excluded_prefixes = vec!["org.shell".to_string()];
        let filter = config.exclusion_filter();

        assert!(filter.is_excluded("com.example.applock"));
        assert!(filter.is_excluded("org.shell.panel"));
        assert!(!filter.is_excluded("com.android.systemui"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            r#"{"own_app_id": ""}"#,
            r#"{"own_app_id": "a", "poll_interval_ms": 0}"#,
            r#"{"own_app_id": "a", "poll_interval_ms": 60001}"#,
            r#"{"own_app_id": "a", "usage_window_ms": 0}"#,
            r#"{"own_app_id": "a", "default_grace_ms": 0}"#,
        ];
        for json in cases {
            assert!(
                matches!(EngineConfig::from_json_str(json), Err(ConfigError::Invalid { .. })),
                "accepted {json}"
            );
        }
    }

    #[test]
    fn test_missing_own_app_is_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{}"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"own_app_id": "com.example.applock", "default_grace_ms": 10000}}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.default_grace(), Duration::from_secs(10));

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            EngineConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
