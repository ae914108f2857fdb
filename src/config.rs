//! Runtime configuration
//!
//! Every tunable lives here as a named default; components receive their
//! section of [`CoreConfig`] at construction.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::clock::ClockMode;

pub const DEFAULT_MAX_SPEED: f64 = 99.0;
pub const DEFAULT_VALIDITY_MARGIN_DAYS: i64 = 14;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_BASE_URL: &str = "https://celestrak.org/NORAD/elements/gp.php";
pub const DEFAULT_PATH_SAMPLES: usize = 360;
pub const MIN_PATH_SAMPLES: usize = 250;
pub const MAX_PATH_SAMPLES: usize = 500;
pub const DEFAULT_PATH_TTL_SECS: f64 = 60.0;
pub const DEFAULT_POSITION_TTL_SECS: f64 = 0.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub clock: ClockConfig,
    pub store: StoreConfig,
    pub geometry: GeometryConfig,
}

impl CoreConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("parse config")
    }

    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Magnitude limit for the speed multiplier.
    pub max_speed: f64,
    pub initial_mode: ClockMode,
    pub initial_speed: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            initial_mode: ClockMode::Simulated,
            initial_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub validity_margin_days: i64,
    pub retry_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Overrides the platform cache directory when set.
    pub cache_dir: Option<PathBuf>,
    /// Disables the on-disk cache entirely.
    pub disk_cache: bool,
    pub base_url: String,
}

impl StoreConfig {
    pub fn validity_margin(&self) -> TimeDelta {
        TimeDelta::days(self.validity_margin_days)
    }

    pub fn retry_interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.retry_interval_secs as i64)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            validity_margin_days: DEFAULT_VALIDITY_MARGIN_DAYS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_dir: None,
            disk_cache: true,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub path_samples: usize,
    /// Simulated seconds an orbit path stays reusable.
    pub path_ttl_secs: f64,
    /// Simulated seconds a position stays reusable; 0 recomputes on every new epoch.
    pub position_ttl_secs: f64,
}

impl GeometryConfig {
    /// Sample count clamped to the supported resolution range.
    pub fn samples(&self) -> usize {
        self.path_samples.clamp(MIN_PATH_SAMPLES, MAX_PATH_SAMPLES)
    }

    pub fn path_ttl(&self) -> TimeDelta {
        seconds_to_delta(self.path_ttl_secs)
    }

    pub fn position_ttl(&self) -> TimeDelta {
        seconds_to_delta(self.position_ttl_secs)
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            path_samples: DEFAULT_PATH_SAMPLES,
            path_ttl_secs: DEFAULT_PATH_TTL_SECS,
            position_ttl_secs: DEFAULT_POSITION_TTL_SECS,
        }
    }
}

fn seconds_to_delta(secs: f64) -> TimeDelta {
    if !secs.is_finite() || secs <= 0.0 {
        return TimeDelta::zero();
    }
    TimeDelta::nanoseconds((secs * 1e9) as i64)
}
