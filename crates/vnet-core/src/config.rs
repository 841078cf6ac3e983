use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::MAX_FILE_FEED_CHUNK_SIZE;
use crate::retry::RetryPolicy;

/// Backoff parameters for nodes answering "node busy" (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusyRetryConfig {
    /// Maximum number of busy replies tolerated per node (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for BusyRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

impl BusyRetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Global configuration loaded from `~/.config/vnet/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnetConfig {
    /// Largest chunk requested in one FILE_FEED exchange (bytes, at most 51200).
    pub max_chunk_size: u32,
    /// Conservative estimate of one request/response round trip, in milliseconds.
    pub round_trip_estimate_ms: u64,
    /// Lower bound for a per-chunk request timeout, in milliseconds.
    pub min_chunk_timeout_ms: u64,
    /// Share of the remaining deadline granted to a single chunk request.
    pub chunk_timeout_fraction: f64,
    /// Fallback nodes become eligible once the remaining deadline drops below
    /// this share of the total (or below one round trip, whichever is larger).
    pub fallback_reserve_fraction: f64,
    /// Per-chunk timeouts a node may accumulate before it is dropped for the session.
    pub max_node_timeouts: u32,
    /// Optional busy backoff policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub busy: Option<BusyRetryConfig>,
}

impl Default for VnetConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: MAX_FILE_FEED_CHUNK_SIZE,
            round_trip_estimate_ms: 200,
            min_chunk_timeout_ms: 100,
            chunk_timeout_fraction: 0.25,
            fallback_reserve_fraction: 0.25,
            max_node_timeouts: 2,
            busy: None,
        }
    }
}

/// Rejected configuration value.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("max_chunk_size must be between 1 and 51200, got {0}")]
    ChunkSize(u32),
    #[error("{name} must be in (0, 1], got {value}")]
    Fraction { name: &'static str, value: f64 },
    #[error("round_trip_estimate_ms must be positive")]
    RoundTrip,
    #[error("max_node_timeouts must be at least 1")]
    NodeTimeouts,
    #[error("busy.max_attempts must be at least 1")]
    BusyAttempts,
}

impl VnetConfig {
    /// Check ranges that the session relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size == 0 || self.max_chunk_size > MAX_FILE_FEED_CHUNK_SIZE {
            return Err(ConfigError::ChunkSize(self.max_chunk_size));
        }
        for (name, value) in [
            ("chunk_timeout_fraction", self.chunk_timeout_fraction),
            ("fallback_reserve_fraction", self.fallback_reserve_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Fraction { name, value });
            }
        }
        if self.round_trip_estimate_ms == 0 {
            return Err(ConfigError::RoundTrip);
        }
        if self.max_node_timeouts == 0 {
            return Err(ConfigError::NodeTimeouts);
        }
        if self.busy_retry().max_attempts == 0 {
            return Err(ConfigError::BusyAttempts);
        }
        Ok(())
    }

    /// Busy backoff section, or defaults when absent.
    pub fn busy_retry(&self) -> BusyRetryConfig {
        self.busy.clone().unwrap_or_default()
    }

    pub fn round_trip_estimate(&self) -> Duration {
        Duration::from_millis(self.round_trip_estimate_ms)
    }

    pub fn min_chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.min_chunk_timeout_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vnet")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VnetConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VnetConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: VnetConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = VnetConfig::default();
        assert_eq!(cfg.max_chunk_size, 51200);
        assert_eq!(cfg.round_trip_estimate_ms, 200);
        assert_eq!(cfg.max_node_timeouts, 2);
        assert!(cfg.busy.is_none());
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = VnetConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: VnetConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_chunk_size, cfg.max_chunk_size);
        assert_eq!(parsed.min_chunk_timeout_ms, cfg.min_chunk_timeout_ms);
        assert!((parsed.chunk_timeout_fraction - cfg.chunk_timeout_fraction).abs() < 1e-9);
    }

    #[test]
    fn config_toml_busy_section() {
        let toml = r#"
            max_chunk_size = 16384
            round_trip_estimate_ms = 50
            min_chunk_timeout_ms = 20
            chunk_timeout_fraction = 0.5
            fallback_reserve_fraction = 0.3
            max_node_timeouts = 1

            [busy]
            max_attempts = 2
            base_delay_ms = 10
            max_delay_ms = 40
        "#;
        let cfg: VnetConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_chunk_size, 16384);
        let busy = cfg.busy_retry();
        assert_eq!(busy.max_attempts, 2);
        let policy = busy.policy();
        assert_eq!(policy.base_delay, Duration::from_millis(10));
        assert_eq!(policy.max_delay, Duration::from_millis(40));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_oversized_chunks() {
        let cfg = VnetConfig {
            max_chunk_size: MAX_FILE_FEED_CHUNK_SIZE + 1,
            ..VnetConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ChunkSize(MAX_FILE_FEED_CHUNK_SIZE + 1))
        );
    }

    #[test]
    fn validate_rejects_bad_fractions() {
        let cfg = VnetConfig {
            chunk_timeout_fraction: 0.0,
            ..VnetConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Fraction {
                name: "chunk_timeout_fraction",
                ..
            })
        ));
        let cfg = VnetConfig {
            fallback_reserve_fraction: 1.5,
            ..VnetConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Fraction { .. })));
    }
}
