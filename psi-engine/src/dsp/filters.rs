//! IIR filter design and zero-phase filtering
//!
//! Filters are represented as cascaded second-order sections (biquads in
//! transposed direct form II). Design follows the classic route:
//! analog Butterworth prototype -> band-pass transform -> bilinear transform
//! with frequency pre-warping.

use rustfft::num_complex::Complex;
use thiserror::Error;

/// Filter design errors
#[derive(Debug, Error)]
pub enum FilterError {
    /// Corner or notch frequency outside (0, Nyquist)
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Unsupported design parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// One second-order section, `a[0]` normalized to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Steady-state internal state for a unit step input
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let denom = 1.0 + a1 + a2;
        if denom.abs() < 1e-300 {
            return [0.0, 0.0];
        }
        let y = (b0 + b1 + b2) / denom;
        let z2 = b2 - a2 * y;
        let z1 = b1 - a1 * y + z2;
        [z1, z2]
    }

    /// DC gain of the section
    fn dc_gain(&self) -> f64 {
        let denom = self.a.iter().sum::<f64>();
        if denom.abs() < 1e-300 {
            0.0
        } else {
            self.b.iter().sum::<f64>() / denom
        }
    }

    /// Filter `x` in place starting from state `z`
    fn run(&self, x: &mut [f64], mut z: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        for s in x.iter_mut() {
            let input = *s;
            let y = b0 * input + z[0];
            z[0] = b1 * input - a1 * y + z[1];
            z[1] = b2 * input - a2 * y;
            *s = y;
        }
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    /// Digital Butterworth band-pass of the given prototype order
    ///
    /// The resulting filter has `2 * order` poles arranged in `order`
    /// sections. Corner frequencies are in Hz.
    pub fn butter_bandpass(order: usize, lo_hz: f64, hi_hz: f64, fs: f64) -> Result<Self, FilterError> {
        if order == 0 {
            return Err(FilterError::InvalidParameters("order must be >= 1".to_string()));
        }
        let nyquist = fs / 2.0;
        let (w1, w2) = (lo_hz / nyquist, hi_hz / nyquist);
        if !(w1.is_finite() && w2.is_finite()) || w1 <= 0.0 || w2 >= 1.0 || w1 >= w2 {
            return Err(FilterError::InvalidFrequency(format!(
                "band [{}, {}] Hz invalid at fs={} Hz",
                lo_hz, hi_hz, fs
            )));
        }

        // Pre-warp to the analog domain (bilinear transform with fs = 2)
        let warp = |w: f64| 4.0 * (std::f64::consts::PI * w / 2.0).tan();
        let (wa1, wa2) = (warp(w1), warp(w2));
        let bw = wa2 - wa1;
        let wo2 = wa1 * wa2;

        // Analog Butterworth prototype poles on the left unit half-circle
        let n = order as f64;
        let mut analog_poles = Vec::with_capacity(2 * order);
        for k in 0..order {
            let m = -(n - 1.0) + 2.0 * k as f64;
            let theta = std::f64::consts::PI * m / (2.0 * n);
            let p = -Complex::new(theta.cos(), theta.sin());
            // Low-pass to band-pass: each pole splits into two
            let scaled = p * (bw / 2.0);
            let root = (scaled * scaled - wo2).sqrt();
            analog_poles.push(scaled + root);
            analog_poles.push(scaled - root);
        }

        // Bilinear transform: zeros at s=0 map to z=+1, zeros at infinity to z=-1
        let fs2 = Complex::new(4.0, 0.0);
        let digital_poles: Vec<Complex<f64>> = analog_poles
            .iter()
            .map(|&p| (fs2 + p) / (fs2 - p))
            .collect();
        let mut gain = Complex::new(bw.powi(order as i32), 0.0) * fs2.powi(order as i32);
        for &p in &analog_poles {
            gain /= fs2 - p;
        }

        let sections = pair_poles(&digital_poles)
            .into_iter()
            .map(|a| Biquad { b: [1.0, 0.0, -1.0], a })
            .collect::<Vec<_>>();

        let mut filter = SosFilter { sections };
        if let Some(first) = filter.sections.first_mut() {
            for b in first.b.iter_mut() {
                *b *= gain.re;
            }
        }
        Ok(filter)
    }

    /// Second-order IIR notch at `freq_hz` with quality factor `q`
    pub fn notch(freq_hz: f64, q: f64, fs: f64) -> Result<Self, FilterError> {
        let w0 = freq_hz / (fs / 2.0);
        if !w0.is_finite() || w0 <= 0.0 || w0 >= 1.0 {
            return Err(FilterError::InvalidFrequency(format!(
                "notch {} Hz must lie strictly inside (0, {}) Hz",
                freq_hz,
                fs / 2.0
            )));
        }
        if q <= 0.0 {
            return Err(FilterError::InvalidParameters(format!("q must be positive, got {}", q)));
        }
        let bw = w0 / q;
        let beta = (bw * std::f64::consts::PI / 2.0).tan();
        let gain = 1.0 / (1.0 + beta);
        let cos_w0 = (w0 * std::f64::consts::PI).cos();
        Ok(SosFilter {
            sections: vec![Biquad {
                b: [gain, -2.0 * gain * cos_w0, gain],
                a: [1.0, -2.0 * gain * cos_w0, 2.0 * gain - 1.0],
            }],
        })
    }

    /// Second-order sections of the cascade
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64, fs: f64) -> f64 {
        let w = 2.0 * std::f64::consts::PI * freq_hz / fs;
        let z1 = Complex::new(w.cos(), -w.sin());
        let z2 = z1 * z1;
        self.sections
            .iter()
            .map(|s| {
                let num = s.b[0] + z1 * s.b[1] + z2 * s.b[2];
                let den = s.a[0] + z1 * s.a[1] + z2 * s.a[2];
                (num / den).norm()
            })
            .product()
    }

    /// Zero-phase forward-backward filtering
    ///
    /// The signal is extended by odd reflection (`3 * (2 * sections + 1)`
    /// samples each side, capped at `len - 1`) and both passes start from
    /// the steady-state response to the edge sample. Signals shorter than
    /// two samples are returned unchanged.
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        if n < 2 || self.sections.is_empty() {
            return x.to_vec();
        }
        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);

        let mut ext = Vec::with_capacity(n + 2 * padlen);
        for i in (1..=padlen).rev() {
            ext.push(2.0 * x[0] - x[i]);
        }
        ext.extend_from_slice(x);
        for i in 1..=padlen {
            ext.push(2.0 * x[n - 1] - x[n - 1 - i]);
        }

        let zi = self.step_states();

        let x0 = ext[0];
        self.run_with_state(&mut ext, &zi, x0);
        ext.reverse();
        let y0 = ext[0];
        self.run_with_state(&mut ext, &zi, y0);
        ext.reverse();

        ext[padlen..padlen + n].to_vec()
    }

    /// Per-section steady-state for a unit step entering the cascade
    fn step_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|s| {
                let z = s.step_state();
                let scaled = [z[0] * scale, z[1] * scale];
                scale *= s.dc_gain();
                scaled
            })
            .collect()
    }

    fn run_with_state(&self, x: &mut [f64], zi: &[[f64; 2]], edge: f64) {
        for (section, z) in self.sections.iter().zip(zi) {
            section.run(x, [z[0] * edge, z[1] * edge]);
        }
    }
}

/// Group digital poles into denominator polynomials of second-order sections
///
/// Complex poles pair with their conjugates; real poles pair with each
/// other (a lone real pole gets a first-order section).
fn pair_poles(poles: &[Complex<f64>]) -> Vec<[f64; 3]> {
    const IMAG_EPS: f64 = 1e-12;
    let mut sections = Vec::new();
    let mut reals = Vec::new();
    for p in poles {
        if p.im > IMAG_EPS {
            sections.push([1.0, -2.0 * p.re, p.norm_sqr()]);
        } else if p.im.abs() <= IMAG_EPS {
            reals.push(p.re);
        }
    }
    for pair in reals.chunks(2) {
        match pair {
            [r1, r2] => sections.push([1.0, -(r1 + r2), r1 * r2]),
            [r] => sections.push([1.0, -r, 0.0]),
            _ => {}
        }
    }
    sections
}
