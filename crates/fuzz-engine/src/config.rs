//! Run configuration: defaults, then an optional TOML file, then `FUZZ_*`
//! environment overrides. The CLI applies its flags last.

use std::path::{Path, PathBuf};

use core_mutate::MutationPolicy;
use core_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::MinimizeConfig;

pub const ENV_TRIALS: &str = "FUZZ_TRIALS";
pub const ENV_SEED: &str = "FUZZ_SEED";
pub const ENV_CID: &str = "FUZZ_CID";
pub const ENV_HARDENED: &str = "FUZZ_HARDENED";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },
    #[error("{name} must be within [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    pub trials: u64,
    pub seed: u64,
    pub session: SessionConfig,
    pub policy: MutationPolicy,
    pub minimize: MinimizeConfig,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            trials: 2000,
            seed: 1337,
            session: SessionConfig::default(),
            policy: MutationPolicy::default(),
            minimize: MinimizeConfig::default(),
        }
    }
}

impl FuzzConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `FUZZ_TRIALS`, `FUZZ_SEED`, `FUZZ_CID` and `FUZZ_HARDENED` from
    /// the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|k| std::env::var(k).ok())
    }

    pub fn apply_env_from<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get(ENV_TRIALS) {
            self.trials = v.trim().parse().map_err(|_| env_err(ENV_TRIALS, &v))?;
        }
        if let Some(v) = get(ENV_SEED) {
            self.seed = v.trim().parse().map_err(|_| env_err(ENV_SEED, &v))?;
        }
        if let Some(v) = get(ENV_CID) {
            self.session.cid = parse_cid(&v).ok_or_else(|| env_err(ENV_CID, &v))?;
        }
        if let Some(v) = get(ENV_HARDENED) {
            let on = parse_bool(&v).ok_or_else(|| env_err(ENV_HARDENED, &v))?;
            self.session.max_config_frame = if on {
                SessionConfig::hardened().max_config_frame
            } else {
                None
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.policy.probabilities() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }
        Ok(())
    }
}

/// Decimal or `0x`-prefixed hex.
pub fn parse_cid(s: &str) -> Option<u16> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_err(name: &'static str, value: &str) -> ConfigError {
    ConfigError::Env { name, value: value.to_string() }
}
