//! Envelope and spectral feature extraction
//!
//! From a conditioned signal the extractor takes an analysis window of up to
//! `window_sec` seconds and derives:
//!
//! - the smoothed, peak-normalized analytic envelope;
//! - dominant frequency, spectral centroid and bandwidth of the
//!   detrended, Hann-tapered window;
//! - envelope statistics (`energy`, `noise`, `gamma`, `beta`, `lam`);
//! - the heuristic collapse time `ct_proxy` and the energy-drop ratio.
//!
//! Every scalar is finite: NaN/Inf become 0 before they leave this module.

use crate::conditioner::{self, ConditionedSignal};
use crate::dsp::spectrum;
use crate::stats::{self, finite_or_zero};
use psi_common::config::FeatureConfig;
use psi_common::{Domain, PsiConfig, Result};
use serde::Serialize;
use tracing::debug;

/// Scalar features of one recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureMap {
    /// Dominant frequency (Hz)
    pub dom: f64,
    /// Spectral centroid (Hz)
    pub cen: f64,
    /// Spectral bandwidth (Hz)
    pub bw: f64,
    /// Mean envelope, in [0, 1]
    pub energy: f64,
    /// Residual standard deviation, in [0, 1]
    pub noise: f64,
    /// Inverse half-width of the envelope peak (1/s)
    pub gamma: f64,
    /// Mean absolute envelope gradient
    pub beta: f64,
    /// Bandwidth over Nyquist, in [0, 2]
    pub lam: f64,
    /// Heuristic collapse time (s)
    pub ct_proxy: f64,
    /// Post/pre collapse envelope ratio
    pub drop_ratio: f64,
}

impl FeatureMap {
    /// Name/value pairs in a stable order
    pub fn as_pairs(&self) -> [(&'static str, f64); 10] {
        [
            ("dom", self.dom),
            ("cen", self.cen),
            ("bw", self.bw),
            ("energy", self.energy),
            ("noise", self.noise),
            ("gamma", self.gamma),
            ("beta", self.beta),
            ("lam", self.lam),
            ("ct_proxy", self.ct_proxy),
            ("drop_ratio", self.drop_ratio),
        ]
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.as_pairs().into_iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    fn cleaned(self) -> Self {
        Self {
            dom: finite_or_zero(self.dom),
            cen: finite_or_zero(self.cen),
            bw: finite_or_zero(self.bw),
            energy: finite_or_zero(self.energy),
            noise: finite_or_zero(self.noise),
            gamma: finite_or_zero(self.gamma),
            beta: finite_or_zero(self.beta),
            lam: finite_or_zero(self.lam),
            ct_proxy: finite_or_zero(self.ct_proxy),
            drop_ratio: finite_or_zero(self.drop_ratio),
        }
    }
}

/// Model input: `(gamma/5, energy, noise, cen/nyquist, lam)`, each clamped
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureVector(pub [f64; FeatureVector::DIM]);

impl FeatureVector {
    pub const DIM: usize = 5;

    /// Project a feature map onto the model input space
    pub fn from_features(features: &FeatureMap, fs: f64) -> Self {
        let nyquist = (fs / 2.0).max(1e-6);
        let raw = [
            (features.gamma / 5.0).clamp(0.0, 3.0),
            features.energy.clamp(0.0, 1.0),
            features.noise.clamp(0.0, 1.0),
            (features.cen / (nyquist + 1e-6)).clamp(0.0, 1.0),
            features.lam.clamp(0.0, 2.0),
        ];
        FeatureVector(raw.map(finite_or_zero))
    }

    pub fn as_array(&self) -> &[f64; FeatureVector::DIM] {
        &self.0
    }
}

impl From<[f64; FeatureVector::DIM]> for FeatureVector {
    fn from(values: [f64; FeatureVector::DIM]) -> Self {
        FeatureVector(values)
    }
}

/// Everything the extractor derives from one recording
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Analysis window of the conditioned signal
    pub window: Vec<f32>,
    /// Smoothed normalized envelope of `window`
    pub envelope: Vec<f64>,
    pub features: FeatureMap,
    pub vector: FeatureVector,
    /// Sample rate of `window` (Hz)
    pub sample_rate: f64,
}

/// Condition `signal` for `domain` and extract its features
pub fn compute_features(domain: Domain, signal: &[f64], fs: f64, config: &PsiConfig) -> Result<FeatureSet> {
    let conditioned = conditioner::condition(domain, signal, fs, config)?;
    Ok(extract_conditioned(&conditioned, &config.features))
}

/// Feature extraction for a recording without a domain label
pub fn compute_features_unlabeled(signal: &[f64], fs: f64, config: &PsiConfig) -> FeatureSet {
    let conditioned = conditioner::condition_unlabeled(signal, fs);
    extract_conditioned(&conditioned, &config.features)
}

fn extract_conditioned(conditioned: &ConditionedSignal, params: &FeatureConfig) -> FeatureSet {
    extract(&conditioned.samples, conditioned.sample_rate, params)
}

/// Extract features from an already conditioned signal
pub fn extract(signal: &[f32], fs: f64, params: &FeatureConfig) -> FeatureSet {
    let window: Vec<f32> = first_window(signal, fs, params.window_sec, params.min_window_sec)
        .iter()
        .map(|&s| if s.is_finite() { s } else { 0.0 })
        .collect();
    let win64: Vec<f64> = window.iter().map(|&s| s as f64).collect();

    let mut envelope = psi_envelope(&win64);
    stats::sanitize(&mut envelope);

    let dom = dom_freq(&win64, fs);
    let (cen, bw) = spectral_centroid_bandwidth(&win64, fs);
    let energy = stats::mean(&envelope).clamp(0.0, 1.0);
    let residual: Vec<f64> = win64
        .iter()
        .zip(&envelope)
        .map(|(&w, &e)| w - e * sign(w))
        .collect();
    let noise = stats::std_dev(&residual).clamp(0.0, 1.0);
    let gamma = gamma_proxy(&envelope, fs);
    let beta = stats::mean(&stats::gradient(&envelope).iter().map(|g| g.abs()).collect::<Vec<_>>());
    let lam = (bw / (fs / 2.0).max(1e-6)).clamp(0.0, 2.0);
    let ct_proxy = collapse_proxy_time(&envelope, fs, params);
    let drop_ratio = energy_drop_ratio(&envelope, fs, ct_proxy, params.tail_frac);

    let features = FeatureMap {
        dom,
        cen,
        bw,
        energy,
        noise,
        gamma,
        beta,
        lam,
        ct_proxy,
        drop_ratio,
    }
    .cleaned();
    let vector = FeatureVector::from_features(&features, fs);

    debug!(
        samples = window.len(),
        sample_rate = fs,
        dom = features.dom,
        gamma = features.gamma,
        ct_proxy = features.ct_proxy,
        "Features extracted"
    );

    FeatureSet {
        window,
        envelope,
        features,
        vector,
        sample_rate: fs,
    }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Leading analysis window: up to `sec` seconds, at least `min_sec` seconds
/// when the signal is that long; the whole signal when `fs <= 0`
pub fn first_window<T>(sig: &[T], fs: f64, sec: f64, min_sec: f64) -> &[T] {
    if !(fs > 0.0) {
        return sig;
    }
    let n = sig.len().min((sec * fs) as usize);
    let floor = sig.len().min((min_sec * fs) as usize);
    &sig[..n.max(floor)]
}

/// Peak-normalized analytic envelope smoothed by a centered moving average
///
/// Kernel length is `max(3, len / 200)` rounded up to odd; edges are
/// zero-padded and the output has the input's length.
pub fn psi_envelope(window: &[f64]) -> Vec<f64> {
    if window.is_empty() {
        return Vec::new();
    }
    let env = spectrum::analytic_envelope(window);
    let peak = env.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let norm = peak + 1e-12;
    let env: Vec<f64> = env.iter().map(|v| v / norm).collect();

    let mut width = (env.len() / 200).max(3);
    if width % 2 == 0 {
        width += 1;
    }
    moving_average_same(&env, width)
}

/// Centered moving average with zero padding, output length = input length
fn moving_average_same(x: &[f64], width: usize) -> Vec<f64> {
    let n = x.len();
    let half = width / 2;
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &v in x {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v);
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            (prefix[hi] - prefix[lo]) / width as f64
        })
        .collect()
}

/// Frequency of the largest spectral bin at index 2 or above
///
/// 0 for fewer than 4 samples, `fs <= 0` or fewer than 3 bins.
pub fn dom_freq(window: &[f64], fs: f64) -> f64 {
    if window.len() < 4 || !(fs > 0.0) {
        return 0.0;
    }
    let (freqs, mags) = spectrum::windowed_spectrum(window, fs);
    if freqs.len() < 3 {
        return 0.0;
    }
    stats::argmax(&mags[2..]).map(|i| freqs[i + 2]).unwrap_or(0.0)
}

/// Magnitude-weighted spectral centroid and RMS bandwidth (Hz)
pub fn spectral_centroid_bandwidth(window: &[f64], fs: f64) -> (f64, f64) {
    if window.len() < 4 || !(fs > 0.0) {
        return (0.0, 0.0);
    }
    let (freqs, mags) = spectrum::windowed_spectrum(window, fs);
    let weights: Vec<f64> = mags.iter().map(|m| m + 1e-12).collect();
    let total: f64 = weights.iter().sum();
    let cen = freqs.iter().zip(&weights).map(|(f, w)| f * w).sum::<f64>() / total;
    let spread = freqs
        .iter()
        .zip(&weights)
        .map(|(f, w)| (f - cen).powi(2) * w)
        .sum::<f64>()
        / total;
    (cen, spread.sqrt())
}

/// Inverse half-width at half-maximum of the envelope peak
///
/// 0.1 when the peak sits on the boundary or a half-maximum crossing is
/// missing on either side; 0 for an empty envelope or `fs <= 0`.
pub fn gamma_proxy(env: &[f64], fs: f64) -> f64 {
    if env.is_empty() || !(fs > 0.0) {
        return 0.0;
    }
    let Some(pk) = stats::argmax(env) else {
        return 0.0;
    };
    if pk <= 1 || pk + 2 >= env.len() {
        return 0.1;
    }
    let half = env[pk] / 2.0;
    let left = env[..pk].iter().rposition(|&v| v <= half);
    let right = env[pk..].iter().position(|&v| v <= half);
    match (left, right) {
        (Some(l), Some(r)) => {
            let width = (pk - l + r) as f64 / fs;
            1.0 / (width + 1e-3)
        }
        _ => 0.1,
    }
}

/// Heuristic collapse time (seconds)
///
/// Starting `peak_pad_sec` after the envelope peak, returns the first time
/// the envelope stays at or below `collapse_threshold` for `min_hold_sec`
/// (or until the end of the window). Failing that, fits `ln env = a - b t`
/// to the tail and solves for the threshold crossing, clipped to the tail;
/// a non-decaying fit gives the tail midpoint.
pub fn collapse_proxy_time(env: &[f64], fs: f64, params: &FeatureConfig) -> f64 {
    if !(fs > 0.0) || env.is_empty() {
        return 0.0;
    }
    let n = env.len();
    let pk = stats::argmax(env).unwrap_or(0);
    let start = (n - 1).min(pk + (params.peak_pad_sec * fs) as usize);
    let tail = &env[start..];
    let thr = params.collapse_threshold;
    let hold = ((params.min_hold_sec * fs) as usize).max(1);

    // First maximal run below threshold that is long enough or reaches the end
    let mut run_start: Option<usize> = None;
    for (j, &v) in tail.iter().enumerate() {
        if v <= thr {
            let s = *run_start.get_or_insert(j);
            if j + 1 - s >= hold {
                return (start + s) as f64 / fs;
            }
        } else {
            run_start = None;
        }
    }
    if let Some(s) = run_start {
        return (start + s) as f64 / fs;
    }

    // Exponential decay fit on the log envelope
    let t: Vec<f64> = (0..tail.len()).map(|i| i as f64 / fs).collect();
    let y: Vec<f64> = tail.iter().map(|v| v.clamp(1e-6, 1.0).ln()).collect();
    let (a, b) = fit_log_decay(&t, &y);
    if !(b > 1e-6) || !a.is_finite() {
        return (start + tail.len() / 2) as f64 / fs;
    }
    let t_last = t.last().copied().unwrap_or(0.0);
    let t_hit = ((a - thr.ln()) / b).clamp(0.0, t_last);
    (start + (t_hit * fs) as usize) as f64 / fs
}

/// Least-squares `y = a - b t`, returning `(a, b)`; `b = 0` when `t` has no
/// spread
fn fit_log_decay(t: &[f64], y: &[f64]) -> (f64, f64) {
    let t_mean = stats::mean(t);
    let y_mean = stats::mean(y);
    let mut stt = 0.0;
    let mut sty = 0.0;
    for (&ti, &yi) in t.iter().zip(y) {
        stt += (ti - t_mean).powi(2);
        sty += (ti - t_mean) * (yi - y_mean);
    }
    if stt <= 0.0 {
        return (y_mean, 0.0);
    }
    let slope = sty / stt;
    (y_mean - slope * t_mean, -slope)
}

/// Mean envelope over the trailing `tail_frac` of the window divided by the
/// mean envelope before the collapse split; both floored at 1e-6
pub fn energy_drop_ratio(env: &[f64], fs: f64, ct: f64, tail_frac: f64) -> f64 {
    if env.is_empty() || !(fs > 0.0) {
        return 0.0;
    }
    let n = env.len();
    let split = (ct * fs).max(1.0).min(n as f64 - 2.0) as i64;
    let before = if split > 0 {
        stats::mean(&env[..split as usize])
    } else {
        stats::mean(env)
    };
    let tail_start = (n as f64 * (1.0 - tail_frac)) as usize;
    let after = if tail_start < n {
        stats::mean(&env[tail_start..])
    } else {
        env[n - 1]
    };
    after.max(1e-6) / before.max(1e-6)
}
