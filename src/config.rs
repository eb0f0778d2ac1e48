//! Configuration module for the netinspect scanner
//!
//! Limits here are fixed per engine instance. Requests are validated against
//! them but can never change them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Widest `endPort - startPort` a single request may ask for
pub const MAX_PORT_RANGE: u16 = 1024;

/// Smallest per-port connect timeout a request may ask for
pub const MIN_TIMEOUT_MS: u64 = 100;

/// Largest per-port connect timeout a request may ask for
pub const MAX_TIMEOUT_MS: u64 = 5000;

/// Probes allowed in flight at once for one request
pub const MAX_CONCURRENT: usize = 100;

/// Longest accepted host string, in characters
pub const MAX_HOST_LEN: usize = 255;

/// Engine limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum `endPort - startPort`
    pub max_port_range: u16,

    /// Lower bound for the per-port timeout in milliseconds
    pub min_timeout_ms: u64,

    /// Upper bound for the per-port timeout in milliseconds
    pub max_timeout_ms: u64,

    /// Maximum host length in characters
    pub max_host_len: usize,

    /// Per-request cap on simultaneously pending probes
    pub max_concurrent: usize,

    /// Optional cap shared by every request served by one engine.
    /// `None` leaves system-wide fan-out bounded only per request.
    pub global_max_concurrent: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_port_range: MAX_PORT_RANGE,
            min_timeout_ms: MIN_TIMEOUT_MS,
            max_timeout_ms: MAX_TIMEOUT_MS,
            max_host_len: MAX_HOST_LEN,
            max_concurrent: MAX_CONCURRENT,
            global_max_concurrent: None,
        }
    }
}

impl ScanConfig {
    /// Set the per-request concurrency cap
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the process-wide concurrency cap
    pub fn with_global_limit(mut self, limit: usize) -> Self {
        self.global_max_concurrent = Some(limit);
        self
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::ScanError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: ScanConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `~/.netinspect.toml`, falling back to defaults
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let path = home_dir.join(".netinspect.toml");

        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrent == 0 {
            return Err(crate::ScanError::ConfigError(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }

        if self.global_max_concurrent == Some(0) {
            return Err(crate::ScanError::ConfigError(
                "global_max_concurrent must be greater than 0".to_string(),
            ));
        }

        if self.min_timeout_ms == 0 || self.min_timeout_ms > self.max_timeout_ms {
            return Err(crate::ScanError::ConfigError(format!(
                "invalid timeout bounds {}..={} ms",
                self.min_timeout_ms, self.max_timeout_ms
            )));
        }

        if self.max_port_range > u16::MAX - 1 {
            return Err(crate::ScanError::ConfigError(
                "max_port_range cannot exceed 65534".to_string(),
            ));
        }

        if self.max_host_len == 0 {
            return Err(crate::ScanError::ConfigError(
                "max_host_len must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
