//! Engine configuration management via TOML files.
//!
//! All keys live under an `[engine]` table and every key is optional:
//!
//! ```toml
//! [engine]
//! limit_range = 1e-10
//! cache_capacity = 16
//! spin_strategy = "table"
//! real_fft = true
//! parallel = true
//! max_nside = 8192
//! log_path = "logs/transforms.jsonl"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};
use crate::legendre::DEFAULT_LIMIT_RANGE;
use crate::pixel::MAX_NSIDE;
use crate::spin::SpinStrategy;

/// Transform engine configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use healpix_harmonic_core::EngineConfig;
///
/// let config = EngineConfig::load_from_file("config/engine.toml")
///     .unwrap_or_else(|_| EngineConfig::default());
///
/// println!("Spin tables via {:?}", config.spin_strategy);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    /// Down-scaling factor of the recurrences; mantissas stay below its
    /// reciprocal
    pub limit_range: f64,
    /// Resolutions kept per cache kind
    pub cache_capacity: usize,
    /// Builder used for spin-harmonic tables
    pub spin_strategy: SpinStrategy,
    /// Use the half-length FFT for real maps
    pub real_fft: bool,
    /// Run per-ring and per-order loops on the rayon pool
    pub parallel: bool,
    /// Largest accepted resolution
    pub max_nside: usize,
    /// JSON-lines transform log; disabled when absent
    pub log_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::try_from(raw.engine)
    }

    /// Checks the invariants that `from_str` enforces; useful for
    /// configurations built in code.
    pub fn validate(&self) -> TransformResult<()> {
        if !(self.limit_range > 0.0 && self.limit_range < 1.0) {
            return Err(TransformError::invalid_parameter(
                "limit_range",
                self.limit_range.to_string(),
                "0 < limit_range < 1",
            ));
        }
        if self.cache_capacity == 0 {
            return Err(TransformError::invalid_parameter(
                "cache_capacity",
                "0",
                ">= 1",
            ));
        }
        if self.max_nside == 0 || self.max_nside > MAX_NSIDE {
            return Err(TransformError::invalid_parameter(
                "max_nside",
                self.max_nside.to_string(),
                format!("1 <= max_nside <= {}", MAX_NSIDE),
            ));
        }
        Ok(())
    }

    fn try_from(raw: RawEngine) -> Result<Self, ConfigError> {
        let config = Self {
            limit_range: raw.limit_range,
            cache_capacity: raw.cache_capacity,
            spin_strategy: raw.spin_strategy,
            real_fft: raw.real_fft,
            parallel: raw.parallel,
            max_nside: raw.max_nside,
            log_path: raw.log_path,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limit_range: DEFAULT_LIMIT_RANGE,
            cache_capacity: default_cache_capacity(),
            spin_strategy: SpinStrategy::default(),
            real_fft: true,
            parallel: true,
            max_nside: MAX_NSIDE,
            log_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    engine: RawEngine,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngine {
    #[serde(default = "default_limit_range")]
    limit_range: f64,
    #[serde(default = "default_cache_capacity")]
    cache_capacity: usize,
    #[serde(default)]
    spin_strategy: SpinStrategy,
    #[serde(default = "default_true")]
    real_fft: bool,
    #[serde(default = "default_true")]
    parallel: bool,
    #[serde(default = "default_max_nside")]
    max_nside: usize,
    #[serde(default)]
    log_path: Option<PathBuf>,
}

impl Default for RawEngine {
    fn default() -> Self {
        Self {
            limit_range: default_limit_range(),
            cache_capacity: default_cache_capacity(),
            spin_strategy: SpinStrategy::default(),
            real_fft: true,
            parallel: true,
            max_nside: default_max_nside(),
            log_path: None,
        }
    }
}

fn default_limit_range() -> f64 {
    DEFAULT_LIMIT_RANGE
}

fn default_cache_capacity() -> usize {
    16
}

fn default_true() -> bool {
    true
}

fn default_max_nside() -> usize {
    MAX_NSIDE
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    /// Well-formed TOML carrying an out-of-range value
    Invalid(TransformError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
            ConfigError::Invalid(err) => write!(f, "Invalid configuration: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<TransformError> for ConfigError {
    fn from(value: TransformError) -> Self {
        ConfigError::Invalid(value)
    }
}
