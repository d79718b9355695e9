//! Configuration management for procfleet.
//!
//! This module defines the structure of the optional `procfleet.toml` file,
//! the environment settings read at startup, and how both resolve into a
//! [`RespawnPolicy`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::environment::EnvSnapshot;
use crate::policy::{Backoff, RespawnPolicy, DEFAULT_FACTOR, DEFAULT_MAX_DELAY};

/// Environment variable overriding the respawn delay, in milliseconds.
pub const RESPAWN_DELAY_VAR: &str = "PROCFLEET_RESPAWN_DELAY";

pub const DEFAULT_CONFIG_FILE: &str = "procfleet.toml";

/// Top-level configuration structure corresponding to `procfleet.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path to the Procfile.
    pub procfile: Option<PathBuf>,
    /// Path to the env file with overrides.
    pub env_file: Option<PathBuf>,
    /// Base port for the fleet.
    pub port: Option<u16>,
    /// Delay before respawning an exited instance.
    pub respawn_delay_ms: Option<u64>,
    /// "fixed" or "exponential".
    pub respawn_strategy: Option<String>,
    /// Cap on the exponential delay.
    pub respawn_max_delay_ms: Option<u64>,
    /// Growth factor for the exponential delay.
    pub respawn_factor: Option<f64>,
    /// Consecutive respawns before an instance is given up on.
    pub respawn_max_attempts: Option<u32>,
    /// Grace period after the shutdown signal before SIGKILL.
    pub shutdown_timeout_ms: Option<u64>,
    /// Pad instance prefixes to this width.
    pub prefix_length: Option<usize>,
    /// Prepend the elapsed time to each line.
    pub timestamp: Option<bool>,
    /// Colorize prefixes.
    pub colors: Option<bool>,
    /// Strip ANSI escapes from child output.
    pub strip_ansi: Option<bool>,
}

/// Respawn-related knobs collected from every configuration layer.
#[derive(Debug, Clone, Default)]
pub struct RespawnSettings {
    pub delay_ms: Option<u64>,
    pub strategy: Option<String>,
    pub max_delay_ms: Option<u64>,
    pub factor: Option<f64>,
    pub max_attempts: Option<u32>,
}

impl RespawnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delay_ms: config.respawn_delay_ms,
            strategy: config.respawn_strategy.clone(),
            max_delay_ms: config.respawn_max_delay_ms,
            factor: config.respawn_factor,
            max_attempts: config.respawn_max_attempts,
        }
    }

    /// Builds the policy; an unset delay falls back to the policy default.
    pub fn into_policy(self) -> Result<RespawnPolicy> {
        let mut policy = RespawnPolicy::default();
        if let Some(ms) = self.delay_ms {
            policy.delay = Duration::from_millis(ms);
        }
        policy.max_attempts = self.max_attempts;
        policy.backoff = match self.strategy.as_deref().unwrap_or("fixed") {
            "fixed" => Backoff::Fixed,
            "exponential" => {
                let factor = self.factor.unwrap_or(DEFAULT_FACTOR);
                if !factor.is_finite() || factor < 1.0 {
                    bail!("respawn factor must be >= 1.0 (got {})", factor);
                }
                Backoff::Exponential {
                    factor,
                    max: self
                        .max_delay_ms
                        .map(Duration::from_millis)
                        .unwrap_or(DEFAULT_MAX_DELAY),
                }
            }
            other => bail!("unknown respawn strategy '{}' (use fixed or exponential)", other),
        };
        Ok(policy)
    }
}

/// Reads the respawn delay override from the startup environment.
pub fn respawn_delay_from_env(snapshot: &EnvSnapshot) -> Result<Option<u64>> {
    let Some(raw) = snapshot.get(RESPAWN_DELAY_VAR) else {
        return Ok(None);
    };
    let ms = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{} must be a number of milliseconds (got '{}')", RESPAWN_DELAY_VAR, raw))?;
    Ok(Some(ms))
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}
