//! FFT-based primitives: windows, detrending, magnitude spectra and the
//! analytic-signal envelope

use rustfft::{num_complex::Complex, FftPlanner};

/// Symmetric Hann window of length `n`
///
/// `w[k] = 0.5 - 0.5 cos(2 pi k / (n - 1))`; a single-point window is `[1.0]`.
pub fn hann_symmetric(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (n - 1) as f64;
            (0..n)
                .map(|k| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * k as f64 / denom).cos())
                .collect()
        }
    }
}

/// Remove the least-squares straight line fitted against sample index
pub fn detrend_linear(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let nf = n as f64;
    let t_mean = (nf - 1.0) / 2.0;
    let x_mean = x.iter().sum::<f64>() / nf;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &v) in x.iter().enumerate() {
        let dt = i as f64 - t_mean;
        sxy += dt * (v - x_mean);
        sxx += dt * dt;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    x.iter()
        .enumerate()
        .map(|(i, &v)| v - (x_mean + slope * (i as f64 - t_mean)))
        .collect()
}

/// Magnitudes of the one-sided FFT (`n / 2 + 1` bins)
pub fn rfft_magnitude(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let mut buffer: Vec<Complex<f64>> = x.iter().map(|&re| Complex { re, im: 0.0 }).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);
    buffer[..n / 2 + 1].iter().map(|c| c.norm()).collect()
}

/// Bin centre frequencies of the one-sided FFT of an `n`-point signal
pub fn rfft_frequencies(n: usize, fs: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let step = fs / n as f64;
    (0..n / 2 + 1).map(|k| k as f64 * step).collect()
}

/// Magnitude spectrum of the detrended, Hann-windowed signal
///
/// Returns `(frequencies, magnitudes)`. This is the shared front end of the
/// dominant-frequency and centroid estimators.
pub fn windowed_spectrum(x: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let detrended = detrend_linear(x);
    let window = hann_symmetric(detrended.len());
    let tapered: Vec<f64> = detrended.iter().zip(&window).map(|(s, w)| s * w).collect();
    (rfft_frequencies(x.len(), fs), rfft_magnitude(&tapered))
}

/// Magnitude of the analytic signal (FFT Hilbert transform)
///
/// The spectrum is one-sided-doubled (DC and, for even lengths, Nyquist
/// kept as is) and transformed back; the result is the instantaneous
/// amplitude of `x`.
pub fn analytic_envelope(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let mut buffer: Vec<Complex<f64>> = x.iter().map(|&re| Complex { re, im: 0.0 }).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let half = n / 2;
    for (k, c) in buffer.iter_mut().enumerate() {
        let h = if k == 0 || (n % 2 == 0 && k == half) {
            1.0
        } else if k < n.div_ceil(2) {
            2.0
        } else {
            0.0
        };
        *c *= h;
    }

    planner.plan_fft_inverse(n).process(&mut buffer);
    let scale = 1.0 / n as f64;
    buffer.iter().map(|c| c.norm() * scale).collect()
}
