//! Integration tests for configuration resolution and env overrides
//!
//! Uses serial_test to prevent ENV variable race conditions: every test
//! that touches `PSI45_*` variables is marked `#[serial]`.

use psi_common::config::{PsiConfig, CONFIG_ENV_VAR};
use psi_common::logging;
use psi_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::Path;

const OVERRIDE_VARS: &[&str] = &[
    CONFIG_ENV_VAR,
    "PSI45_RESAMPLE_AUDIO_HZ",
    "PSI45_RESAMPLE_EEG_HZ",
    "PSI45_DEFAULT_LIGO_FS",
    "PSI45_DEFAULT_GRACE_FS",
    "PSI45_MAX_LIGO_SAMPLES",
    "PSI45_MAX_GRACE_TIMESTEPS",
    "PSI45_UPLOAD_DIR",
    "PSI45_LOG_LEVEL",
];

fn clear_env() {
    for var in OVERRIDE_VARS {
        env::remove_var(var);
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
#[serial]
fn test_explicit_path_wins() {
    clear_env();
    let file = write_config("[limits]\nmax_ligo_samples = 1000\n");

    let config = PsiConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.limits.max_ligo_samples, 1000);
    assert_eq!(config.limits.max_grace_timesteps, 10_000);
}

#[test]
#[serial]
fn test_env_var_config_path() {
    clear_env();
    let file = write_config("[resample]\neeg_hz = 256\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = PsiConfig::load(None).unwrap();
    assert_eq!(config.resample.eeg_hz, 256);

    clear_env();
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    clear_env();
    let config = PsiConfig::load(Some(Path::new("/nonexistent/psi45/config.toml"))).unwrap();
    assert_eq!(config, PsiConfig::default());
}

#[test]
#[serial]
fn test_env_overrides_apply_on_top_of_file() {
    clear_env();
    let file = write_config("[resample]\naudio_hz = 22050\n");
    env::set_var("PSI45_RESAMPLE_AUDIO_HZ", "8000");
    env::set_var("PSI45_MAX_GRACE_TIMESTEPS", "500");
    env::set_var("PSI45_UPLOAD_DIR", "/tmp/psi45-uploads");

    let config = PsiConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.resample.audio_hz, 8000);
    assert_eq!(config.limits.max_grace_timesteps, 500);
    assert_eq!(config.upload_dir, Path::new("/tmp/psi45-uploads"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_override_is_config_error() {
    clear_env();
    env::set_var("PSI45_DEFAULT_LIGO_FS", "fast");

    let err = PsiConfig::load(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("PSI45_DEFAULT_LIGO_FS"));

    clear_env();
}

#[test]
#[serial]
fn test_zero_override_fails_validation() {
    clear_env();
    env::set_var("PSI45_MAX_LIGO_SAMPLES", "0");

    let err = PsiConfig::load(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    clear_env();
}

#[test]
fn test_logging_init_is_idempotent() {
    let config = PsiConfig::default();
    let first = logging::init(&config.logging).unwrap();
    let second = logging::init(&config.logging).unwrap();
    // Only one global subscriber can be installed per process
    assert!(!(first && second));
    assert!(!second);
}
