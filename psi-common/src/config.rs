//! Configuration loading
//!
//! All tunables of the analysis pipeline live in one [`PsiConfig`] value
//! deserialized from TOML. Every field has a compiled default, so an empty
//! or missing file yields a working configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Explicit path passed by the caller
//! 2. `PSI45_CONFIG` environment variable
//! 3. `<config_dir>/psi45/config.toml` (platform config directory)
//! 4. Compiled defaults
//!
//! Scalar environment overrides (`PSI45_RESAMPLE_AUDIO_HZ`, ...) are applied
//! on top of whichever source won.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PSI45_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PsiConfig {
    /// Directory where the upload layer stages incoming files
    pub upload_dir: PathBuf,
    pub resample: ResampleConfig,
    pub defaults: DefaultRates,
    pub limits: SizeLimits,
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
}

/// Canonical resample targets per domain (Hz)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResampleConfig {
    pub audio_hz: u32,
    pub eeg_hz: u32,
    /// LIGO target for the spectrogram view only
    pub spectro_ligo_hz: u32,
    /// GRACE target for the spectrogram view only
    pub spectro_grace_hz: u32,
}

/// Sample rates assumed when a recording carries none (Hz)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DefaultRates {
    pub ligo_fs: f64,
    pub grace_fs: f64,
}

/// Input size caps; exceeding one fails the file fast
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SizeLimits {
    pub max_ligo_samples: usize,
    pub max_grace_timesteps: usize,
}

/// Feature-extraction constants
///
/// The collapse constants have no physical derivation; they are kept as
/// configuration so results stay reproducible.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    /// Maximum analysis window (seconds)
    pub window_sec: f64,
    /// Minimum analysis window when available (seconds)
    pub min_window_sec: f64,
    /// Envelope level counted as collapsed
    pub collapse_threshold: f64,
    /// How long the envelope must stay below threshold (seconds)
    pub min_hold_sec: f64,
    /// Skip after the envelope peak before scanning (seconds)
    pub peak_pad_sec: f64,
    /// Trailing fraction used for the energy-drop ratio
    pub tail_frac: f64,
}

/// Ensemble model settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Rows of synthetic training data per domain
    pub synthetic_samples: usize,
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
    pub ridge_alpha: f64,
    pub bootstrap_runs: usize,
    /// Function-evaluation budget of one closed-form fit
    pub max_fit_evals: usize,
    /// Forest weight in the forest/ridge blend (ridge gets the rest)
    pub rf_weight: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for PsiConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("_uploads"),
            resample: ResampleConfig::default(),
            defaults: DefaultRates::default(),
            limits: SizeLimits::default(),
            features: FeatureConfig::default(),
            model: ModelConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            audio_hz: 16_000,
            eeg_hz: 128,
            spectro_ligo_hz: 1024,
            spectro_grace_hz: 64,
        }
    }
}

impl Default for DefaultRates {
    fn default() -> Self {
        Self {
            ligo_fs: 4096.0,
            grace_fs: 100.0,
        }
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_ligo_samples: 2_000_000,
            max_grace_timesteps: 10_000,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_sec: 30.0,
            min_window_sec: 5.0,
            collapse_threshold: 0.12,
            min_hold_sec: 0.15,
            peak_pad_sec: 0.05,
            tail_frac: 0.2,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            synthetic_samples: 1500,
            n_trees: 700,
            max_depth: 18,
            seed: 42,
            ridge_alpha: 0.1,
            bootstrap_runs: 40,
            max_fit_evals: 12_000,
            rf_weight: 0.8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl PsiConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: PsiConfig = toml::from_str(toml_str)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let config = Self::from_toml_str(&toml_str)?;
        info!("Loaded TOML configuration from {:?}", path);
        Ok(config)
    }

    /// Resolve configuration following the documented priority order
    ///
    /// A missing file is not fatal: defaults are used and a warning logged.
    /// A file that exists but does not parse is an error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                warn!("Config file {:?} not found, using compiled defaults", path);
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Pick the config file path, highest priority first
    fn locate(explicit_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|d| d.join("psi45").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Apply `PSI45_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u32>("PSI45_RESAMPLE_AUDIO_HZ")? {
            self.resample.audio_hz = v;
        }
        if let Some(v) = env_parse::<u32>("PSI45_RESAMPLE_EEG_HZ")? {
            self.resample.eeg_hz = v;
        }
        if let Some(v) = env_parse::<f64>("PSI45_DEFAULT_LIGO_FS")? {
            self.defaults.ligo_fs = v;
        }
        if let Some(v) = env_parse::<f64>("PSI45_DEFAULT_GRACE_FS")? {
            self.defaults.grace_fs = v;
        }
        if let Some(v) = env_parse::<usize>("PSI45_MAX_LIGO_SAMPLES")? {
            self.limits.max_ligo_samples = v;
        }
        if let Some(v) = env_parse::<usize>("PSI45_MAX_GRACE_TIMESTEPS")? {
            self.limits.max_grace_timesteps = v;
        }
        if let Ok(v) = std::env::var("PSI45_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PSI45_LOG_LEVEL") {
            self.logging.level = v;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.defaults.ligo_fs <= 0.0 || self.defaults.grace_fs <= 0.0 {
            return Err(Error::Config(
                "default sample rates must be positive".to_string(),
            ));
        }
        if self.limits.max_ligo_samples == 0 || self.limits.max_grace_timesteps == 0 {
            return Err(Error::Config("size limits must be positive".to_string()));
        }
        let f = &self.features;
        if f.window_sec <= 0.0 || f.min_window_sec < 0.0 || f.min_window_sec > f.window_sec {
            return Err(Error::Config(format!(
                "invalid analysis window: min {}s, max {}s",
                f.min_window_sec, f.window_sec
            )));
        }
        if !(0.0..1.0).contains(&f.tail_frac) {
            return Err(Error::Config(format!(
                "tail_frac must be in [0, 1), got {}",
                f.tail_frac
            )));
        }
        let m = &self.model;
        if m.n_trees == 0 || m.max_depth == 0 || m.synthetic_samples < 2 {
            return Err(Error::Config(
                "model needs at least one tree, depth 1 and two synthetic rows".to_string(),
            ));
        }
        if !(m.ridge_alpha >= 0.0) {
            return Err(Error::Config(format!(
                "ridge_alpha must be non-negative, got {}",
                m.ridge_alpha
            )));
        }
        if !(0.0..=1.0).contains(&m.rf_weight) {
            return Err(Error::Config(format!(
                "rf_weight must be in [0, 1], got {}",
                m.rf_weight
            )));
        }
        Ok(())
    }
}

/// Read and parse an environment variable, `None` when unset
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
