//! # psi45 Common Library
//!
//! Shared code for the psi45 analysis crates:
//! - Error type and `Result` alias
//! - Domain enum (audio | eeg | ligo | grace)
//! - Configuration loading (TOML + environment overrides)
//! - Logging setup

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::PsiConfig;
pub use domain::Domain;
pub use error::{Error, Result};
