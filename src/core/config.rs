//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TachoError};
use crate::live::gauge::{GaugeConfig, default_gauges};

/// Log levels accepted by `logging.level` and `TACHO_LOG_LEVEL`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Full tacho configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub poller: PollerConfig,
    pub paths: PathsConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
    /// Live gauge board, in display order.
    pub gauges: Vec<GaugeConfig>,
}

/// Live endpoint polling knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollerConfig {
    /// Scheme + host of the DTU, e.g. `http://ahoy-dtu`.
    pub base_url: String,
    /// Path of the live record endpoint.
    pub live_path: String,
    /// Fixed delay between requests.
    pub interval_ms: u64,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Append every successful poll to the snapshot store.
    pub persist: bool,
    /// Bounded capacity of the poller → consumer channel.
    pub channel_capacity: usize,
}

/// Filesystem paths used by tacho.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub sqlite_db: PathBuf,
}

/// Offline viewer knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// How many dynamic fields make up the plot matrix (3×3 by default).
    pub max_plot_fields: usize,
    pub histogram_bins: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poller: PollerConfig::default(),
            paths: PathsConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
            gauges: default_gauges(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://ahoy-dtu".to_string(),
            live_path: "/api/record/live".to_string(),
            interval_ms: 1_000,
            timeout_ms: 5_000,
            persist: true,
            channel_capacity: 16,
        }
    }
}

impl PollerConfig {
    /// Full URL of the live endpoint.
    #[must_use]
    pub fn live_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.live_path)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[TCH-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("tacho").join("config.toml"),
            sqlite_db: home_dir
                .join(".local")
                .join("share")
                .join("tacho")
                .join("ahoydtu.sqlite"),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_plot_fields: 9,
            histogram_bins: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TachoError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else if is_explicit_path {
            return Err(TachoError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // poller
        if let Some(raw) = lookup("TACHO_POLLER_BASE_URL") {
            self.poller.base_url = raw;
        }
        if let Some(raw) = lookup("TACHO_POLLER_LIVE_PATH") {
            self.poller.live_path = raw;
        }
        if let Some(raw) = lookup("TACHO_POLLER_INTERVAL_MS") {
            self.poller.interval_ms = parse_env("TACHO_POLLER_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("TACHO_POLLER_TIMEOUT_MS") {
            self.poller.timeout_ms = parse_env("TACHO_POLLER_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("TACHO_POLLER_PERSIST") {
            self.poller.persist = parse_env("TACHO_POLLER_PERSIST", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("TACHO_SQLITE_DB") {
            self.paths.sqlite_db = PathBuf::from(raw);
        }

        // report
        if let Some(raw) = lookup("TACHO_REPORT_MAX_PLOT_FIELDS") {
            self.report.max_plot_fields = parse_env("TACHO_REPORT_MAX_PLOT_FIELDS", &raw)?;
        }
        if let Some(raw) = lookup("TACHO_REPORT_HISTOGRAM_BINS") {
            self.report.histogram_bins = parse_env("TACHO_REPORT_HISTOGRAM_BINS", &raw)?;
        }

        // logging
        if let Some(raw) = lookup("TACHO_LOG_LEVEL") {
            self.logging.level = raw;
        }

        Ok(())
    }

    fn normalize(&mut self) {
        self.logging.level = self.logging.level.trim().to_ascii_lowercase();
        for gauge in &mut self.gauges {
            gauge.field = gauge.field.trim().to_string();
        }
    }

    fn validate(&self) -> Result<()> {
        let base = &self.poller.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TachoError::InvalidConfig {
                details: format!("poller.base_url must start with http:// or https://, got {base:?}"),
            });
        }
        if !self.poller.live_path.starts_with('/') {
            return Err(TachoError::InvalidConfig {
                details: format!(
                    "poller.live_path must start with '/', got {:?}",
                    self.poller.live_path
                ),
            });
        }
        for (name, val) in [
            ("interval_ms", self.poller.interval_ms),
            ("timeout_ms", self.poller.timeout_ms),
        ] {
            if val == 0 {
                return Err(TachoError::InvalidConfig {
                    details: format!("poller.{name} must be > 0"),
                });
            }
        }
        if self.poller.channel_capacity == 0 {
            return Err(TachoError::InvalidConfig {
                details: "poller.channel_capacity must be >= 1".to_string(),
            });
        }

        if self.report.max_plot_fields == 0 {
            return Err(TachoError::InvalidConfig {
                details: "report.max_plot_fields must be >= 1".to_string(),
            });
        }
        if self.report.histogram_bins == 0 {
            return Err(TachoError::InvalidConfig {
                details: "report.histogram_bins must be >= 1".to_string(),
            });
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(TachoError::InvalidConfig {
                details: format!(
                    "logging.level must be one of {LOG_LEVELS:?}, got {:?}",
                    self.logging.level
                ),
            });
        }

        let mut seen = HashSet::new();
        for gauge in &self.gauges {
            if gauge.field.is_empty() {
                return Err(TachoError::InvalidConfig {
                    details: "gauges[].field must not be empty".to_string(),
                });
            }
            if !seen.insert(gauge.field.as_str()) {
                return Err(TachoError::InvalidConfig {
                    details: format!("duplicate gauge for field {:?}", gauge.field),
                });
            }
            if !(gauge.min.is_finite() && gauge.max.is_finite() && gauge.min < gauge.max) {
                return Err(TachoError::InvalidConfig {
                    details: format!(
                        "gauge {:?}: min ({}) must be < max ({})",
                        gauge.field, gauge.min, gauge.max
                    ),
                });
            }
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| TachoError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
