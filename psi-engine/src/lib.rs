//! # psi45 Analysis Engine (psi-engine)
//!
//! Collapse-time estimation for recordings from four domains.
//!
//! **Purpose:** Decode uploaded recordings, condition them per domain,
//! extract envelope and spectral features, and predict a calibrated
//! collapse time with bootstrap bounds for each file of a batch.
//!
//! **Architecture:** bytes -> [`loader`] -> [`conditioner`] -> [`features`]
//! -> [`ensemble`] (one model per domain batch) -> [`calibration`] ->
//! [`metrics`]. [`batch::analyze_batch`] drives the whole chain;
//! [`spectrogram`] is a standalone view.

pub mod batch;
pub mod calibration;
pub mod conditioner;
pub mod dsp;
pub mod ensemble;
pub mod features;
pub mod loader;
pub mod metrics;
pub mod spectrogram;
pub mod stats;

pub use batch::{analyze_batch, BatchReport, UploadedFile};
pub use calibration::calibrate;
pub use conditioner::condition;
pub use ensemble::{fit_and_predict, train_and_predict, DomainBatch, PredictionBundle};
pub use features::{compute_features, extract, FeatureMap, FeatureVector};
pub use loader::{load, LoadedSignal};
pub use metrics::Metrics;
pub use spectrogram::{spectrogram, Spectrogram};

pub use psi_common::{Domain, Error, PsiConfig, Result};
