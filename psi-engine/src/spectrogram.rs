//! Time-frequency view of a recording
//!
//! Power spectral density per segment (Tukey-tapered, mean-removed,
//! one-sided), decimated to at most 256 x 256 bins and reported in dB,
//! together with the spectral centroid of the time-averaged spectrum.

use crate::dsp::resample_rational;
use psi_common::{Domain, PsiConfig, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::Serialize;
use tracing::debug;

/// Rate cap for recordings without a domain (Hz)
const UNLABELED_MAX_HZ: f64 = 1024.0;
const TUKEY_ALPHA: f64 = 0.25;
const MAX_BINS: usize = 256;
const POWER_FLOOR: f64 = 1e-18;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Spectrogram {
    /// Segment centres (s)
    pub t: Vec<f64>,
    /// Bin frequencies (Hz)
    pub f: Vec<f64>,
    /// Power in dB, indexed `[frequency][time]`
    pub sxx_db: Vec<Vec<f64>>,
    /// Centroid of the time-averaged spectrum (Hz)
    pub ct: f64,
    /// Rate the spectrogram was computed at (Hz)
    pub sample_rate: f64,
}

/// Rate above which the signal is downsampled first
fn target_rate(domain: Option<Domain>, fs: f64, config: &PsiConfig) -> f64 {
    let r = &config.resample;
    match domain {
        Some(Domain::Audio) => r.audio_hz as f64,
        Some(Domain::Eeg) => r.eeg_hz as f64,
        Some(Domain::Ligo) => r.spectro_ligo_hz as f64,
        Some(Domain::Grace) => r.spectro_grace_hz as f64,
        None => fs.floor().min(UNLABELED_MAX_HZ),
    }
}

/// Periodic Tukey window of length `m`
pub fn tukey_periodic(m: usize, alpha: f64) -> Vec<f64> {
    if m <= 1 {
        return vec![1.0; m];
    }
    // Periodic = symmetric of length m + 1 with the last point dropped
    let len = m + 1;
    let span = (len - 1) as f64;
    let width = (alpha * span / 2.0).floor() as usize;
    (0..m)
        .map(|n| {
            let x = n as f64;
            if n <= width {
                0.5 * (1.0 + (std::f64::consts::PI * (-1.0 + 2.0 * x / alpha / span)).cos())
            } else if n >= len - width - 1 {
                0.5 * (1.0 + (std::f64::consts::PI * (-2.0 / alpha + 1.0 + 2.0 * x / alpha / span)).cos())
            } else {
                1.0
            }
        })
        .collect()
}

/// Segment length for `len` samples
fn segment_length(len: usize) -> usize {
    let eighth = if len / 8 == 0 { 64 } else { len / 8 };
    let base = eighth.min(1024).max(64);
    let nperseg = base.min(len);
    if nperseg < 2 {
        len.max(1)
    } else {
        nperseg
    }
}

/// Compute the spectrogram of `signal` sampled at `fs`
///
/// An unset `fs` falls back to the domain's default rate, or to the signal
/// length when there is no domain default.
pub fn spectrogram(domain: Option<Domain>, signal: &[f64], fs: f64, config: &PsiConfig) -> Result<Spectrogram> {
    if signal.is_empty() {
        return Ok(Spectrogram::default());
    }

    let fs = if fs.is_finite() && fs > 0.0 {
        fs
    } else {
        match domain {
            Some(Domain::Ligo) => config.defaults.ligo_fs,
            Some(Domain::Grace) => config.defaults.grace_fs,
            _ => signal.len() as f64,
        }
    };

    let target = target_rate(domain, fs, config);
    let (sig, fs) = if target > 0.0 && fs > target {
        resample_rational(signal, fs, target)?
    } else {
        (signal.to_vec(), fs)
    };
    if sig.is_empty() {
        return Ok(Spectrogram::default());
    }

    let nperseg = segment_length(sig.len());
    let noverlap = (nperseg / 2).min(nperseg - 1);
    let step = nperseg - noverlap;
    let n_segments = (sig.len() - noverlap) / step;

    let window = tukey_periodic(nperseg, TUKEY_ALPHA);
    let scale = 1.0 / (fs * window.iter().map(|w| w * w).sum::<f64>());
    let n_freqs = nperseg / 2 + 1;

    let fft = FftPlanner::<f64>::new().plan_fft_forward(nperseg);
    let mut buf = vec![Complex::new(0.0, 0.0); nperseg];

    // psd[segment][frequency]
    let mut psd: Vec<Vec<f64>> = Vec::with_capacity(n_segments);
    for s in 0..n_segments {
        let seg = &sig[s * step..s * step + nperseg];
        let mean = seg.iter().sum::<f64>() / nperseg as f64;
        for ((b, x), w) in buf.iter_mut().zip(seg).zip(&window) {
            *b = Complex::new((x - mean) * w, 0.0);
        }
        fft.process(&mut buf);
        let row = (0..n_freqs)
            .map(|k| {
                let mut p = buf[k].norm_sqr() * scale;
                let nyquist = nperseg % 2 == 0 && k == n_freqs - 1;
                if k > 0 && !nyquist {
                    p *= 2.0;
                }
                p
            })
            .collect();
        psd.push(row);
    }

    let f_step = n_freqs.div_ceil(MAX_BINS).max(1);
    let t_step = n_segments.div_ceil(MAX_BINS).max(1);
    let freq_idx: Vec<usize> = (0..n_freqs).step_by(f_step).collect();
    let time_idx: Vec<usize> = (0..n_segments).step_by(t_step).collect();

    let f: Vec<f64> = freq_idx.iter().map(|&k| k as f64 * fs / nperseg as f64).collect();
    let t: Vec<f64> = time_idx
        .iter()
        .map(|&s| (nperseg as f64 / 2.0 + (s * step) as f64) / fs)
        .collect();

    let mut sxx_db = Vec::with_capacity(freq_idx.len());
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (&k, &freq) in freq_idx.iter().zip(&f) {
        let powers: Vec<f64> = time_idx.iter().map(|&s| psd[s][k]).collect();
        let mean = powers.iter().sum::<f64>() / powers.len().max(1) as f64;
        weighted += freq * mean;
        total += mean;
        sxx_db.push(powers.iter().map(|p| 10.0 * p.max(POWER_FLOOR).log10()).collect());
    }
    let ct = if total > 0.0 { weighted / total } else { 0.0 };

    debug!(
        samples = sig.len(),
        sample_rate = fs,
        nperseg,
        segments = n_segments,
        ct,
        "Spectrogram computed"
    );

    Ok(Spectrogram {
        t,
        f,
        sxx_db,
        ct,
        sample_rate: fs,
    })
}
