//! Signal-processing primitives used by the conditioner, the feature
//! extractor and the spectrogram view

pub mod filters;
pub mod resample;
pub mod spectrum;

pub use filters::{FilterError, SosFilter};
pub use resample::resample_rational;
