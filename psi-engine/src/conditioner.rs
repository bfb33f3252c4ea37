//! Domain-specific signal conditioning
//!
//! | Domain | Filtering | Rate |
//! |--------|-----------|------|
//! | audio  | band-pass 20 Hz .. min(8000, fs/2 - 1) | resample to `resample.audio_hz` |
//! | eeg    | band-pass 1..45 Hz, notch 50 Hz and 60 Hz | resample to `resample.eeg_hz` |
//! | ligo   | linear detrend | unset fs -> `defaults.ligo_fs` |
//! | grace  | none | unset fs -> `defaults.grace_fs` |
//!
//! Recordings without a domain label go through [`condition_unlabeled`].

use crate::dsp::{resample_rational, spectrum, SosFilter};
use crate::stats;
use psi_common::{Domain, PsiConfig, Result};
use tracing::{debug, warn};

/// Butterworth prototype order of the band-pass filters
const BANDPASS_ORDER: usize = 4;
/// Quality factor of the mains notch filters
const NOTCH_Q: f64 = 30.0;
/// Mains frequencies removed from EEG (Hz)
const MAINS_HZ: [f64; 2] = [50.0, 60.0];

/// A conditioned, finite, single-precision signal
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedSignal {
    pub samples: Vec<f32>,
    /// Sample rate after conditioning (Hz)
    pub sample_rate: f64,
}

impl ConditionedSignal {
    fn from_f64(samples: &[f64], sample_rate: f64) -> Self {
        Self {
            samples: samples.iter().map(|&s| stats::finite_or_zero(s) as f32).collect(),
            sample_rate,
        }
    }
}

/// Filter and resample `signal` for `domain`
///
/// Non-finite input samples are zeroed before filtering.
///
/// # Errors
/// `Error::Resample` if the resampler cannot be built or run.
pub fn condition(domain: Domain, signal: &[f64], fs: f64, config: &PsiConfig) -> Result<ConditionedSignal> {
    let mut sig = signal.to_vec();
    stats::sanitize(&mut sig);

    let (sig, fs) = match domain {
        Domain::Audio => {
            let sig = bandpass(&sig, fs, 20.0, (fs / 2.0 - 1.0).min(8000.0));
            resample_rational(&sig, fs, config.resample.audio_hz as f64)?
        }
        Domain::Eeg => {
            let sig = bandpass(&sig, fs, 1.0, 45.0);
            let sig = notch_mains(&sig, fs);
            resample_rational(&sig, fs, config.resample.eeg_hz as f64)?
        }
        Domain::Ligo => (spectrum::detrend_linear(&sig), rate_or(fs, config.defaults.ligo_fs)),
        Domain::Grace => (sig, rate_or(fs, config.defaults.grace_fs)),
    };

    debug!(domain = %domain, samples = sig.len(), sample_rate = fs, "Signal conditioned");

    Ok(ConditionedSignal::from_f64(&sig, fs))
}

/// Condition a recording of unknown domain
///
/// No filtering; an unset rate becomes the signal length, i.e. the
/// recording is treated as one second long.
pub fn condition_unlabeled(signal: &[f64], fs: f64) -> ConditionedSignal {
    let fs = rate_or(fs, signal.len() as f64);
    ConditionedSignal::from_f64(signal, fs)
}

/// `fs` when it is a usable rate, else `fallback`
fn rate_or(fs: f64, fallback: f64) -> f64 {
    if fs.is_finite() && fs > 0.0 {
        fs
    } else {
        fallback
    }
}

/// Zero-phase Butterworth band-pass
///
/// The band is clamped to `[1e-3, fs/2 - 1e-3]`; the signal passes through
/// unchanged when `fs <= 0` or the clamped band is empty.
pub fn bandpass(sig: &[f64], fs: f64, lo: f64, hi: f64) -> Vec<f64> {
    if !(fs > 0.0) {
        return sig.to_vec();
    }
    let hi = hi.min(fs / 2.0 - 1e-3);
    let lo = lo.max(1e-3);
    if !lo.is_finite() || !hi.is_finite() || lo >= hi {
        debug!(lo, hi, fs, "Empty pass band, skipping band-pass");
        return sig.to_vec();
    }
    match SosFilter::butter_bandpass(BANDPASS_ORDER, lo, hi, fs) {
        Ok(filter) => filter.filtfilt(sig),
        Err(e) => {
            warn!("Band-pass design failed, leaving signal unfiltered: {}", e);
            sig.to_vec()
        }
    }
}

/// Notch out 50 Hz and 60 Hz mains hum
///
/// Each notch is attempted on its own; one whose design fails (e.g. at or
/// above Nyquist) is skipped.
pub fn notch_mains(sig: &[f64], fs: f64) -> Vec<f64> {
    if !(fs > 0.0) {
        return sig.to_vec();
    }
    let mut out = sig.to_vec();
    for freq in MAINS_HZ {
        match SosFilter::notch(freq, NOTCH_Q, fs) {
            Ok(filter) => out = filter.filtfilt(&out),
            Err(e) => debug!(freq, fs, "Skipping mains notch: {}", e),
        }
    }
    out
}
