//! Rational-ratio resampling using rubato
//!
//! Converts a mono signal to a canonical domain rate. The ratio is
//! `round(target) / round(fs)` reduced by its GCD; the FFT resampler
//! band-limits the signal to the lower of the two Nyquist frequencies.
//!
//! The resampler's anti-aliasing filter is centred on input sample
//! `fft_size_in / 2`. That lands on an output sample only when the number
//! of ratio periods per FFT block is even, so the input chunk is always a
//! whole even number of periods and the output is returned with zero delay.

use psi_common::{Error, Result};
use rubato::{FftFixedInOut, Resampler};
use tracing::debug;

/// Smallest input chunk fed to the FFT resampler
const CHUNK_SIZE: usize = 1024;

/// Input chunk covering an even number of `down`-sample ratio periods
fn chunk_size(down: usize) -> usize {
    let pair = 2 * down;
    CHUNK_SIZE.div_ceil(pair).max(1) * pair
}

/// Output samples between an input sample and its resampled counterpart
///
/// `None` when the filter centre falls between output samples.
fn filter_delay(fft_size_in: usize, fft_size_out: usize) -> Option<usize> {
    let centre = (fft_size_in / 2).checked_mul(fft_size_out)?;
    (fft_size_in > 0 && centre % fft_size_in == 0).then(|| centre / fft_size_in)
}

/// Resample `signal` from `fs` to `target` Hz
///
/// Returns the resampled signal and its new rate. The signal is returned
/// unchanged (with rate `fs`) when `target` is zero, already equal to
/// `fs`, or `fs` is not positive. Output length is `ceil(n * up / down)`.
pub fn resample_rational(signal: &[f64], fs: f64, target: f64) -> Result<(Vec<f64>, f64)> {
    if !(target > 0.0) || !(fs > 0.0) || (fs - target).abs() < 1e-9 {
        return Ok((signal.to_vec(), fs));
    }

    let up = (target.round() as usize).max(1);
    let down = (fs.round() as usize).max(1);
    let g = gcd(up, down);
    let (up, down) = (up / g, down / g);
    if up == down {
        return Ok((signal.to_vec(), target));
    }
    if signal.is_empty() {
        return Ok((Vec::new(), target));
    }

    debug!(from_rate = fs, to_rate = target, up, down, samples = signal.len(), "Resampling");

    let mut resampler = FftFixedInOut::<f64>::new(down, up, chunk_size(down), 1)
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {}", e)))?;

    let fft_size_in = resampler.input_frames_next();
    let fft_size_out = resampler.output_frames_next();
    let delay = filter_delay(fft_size_in, fft_size_out).ok_or_else(|| {
        Error::Resample(format!(
            "Resampler block {}:{} has a fractional delay",
            fft_size_in, fft_size_out
        ))
    })?;
    let expected = (signal.len() * up).div_ceil(down);
    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut pos = 0;

    // Feed zero-padded chunks until the delayed output covers the signal
    while output.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let mut chunk = vec![0.0f64; needed];
        if pos < signal.len() {
            let end = (pos + needed).min(signal.len());
            chunk[..end - pos].copy_from_slice(&signal[pos..end]);
        }
        pos += needed;

        let processed = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;
        match processed.into_iter().next() {
            Some(channel) if !channel.is_empty() => output.extend(channel),
            _ => return Err(Error::Resample("Resampler produced no output".to_string())),
        }
    }

    output.drain(..delay);
    output.truncate(expected);

    debug!(input = signal.len(), output = output.len(), "Resampling complete");

    Ok((output, target))
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(16000, 44100), 100);
        assert_eq!(gcd(128, 256), 128);
        assert_eq!(gcd(0, 5), 5);
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        let x = vec![0.1, 0.2, 0.3];
        let (y, fs) = resample_rational(&x, 16000.0, 16000.0).unwrap();
        assert_eq!(y, x);
        assert_eq!(fs, 16000.0);
    }

    #[test]
    fn test_zero_target_or_rate_is_passthrough() {
        let x = vec![1.0, 2.0];
        assert_eq!(resample_rational(&x, 100.0, 0.0).unwrap(), (x.clone(), 100.0));
        assert_eq!(resample_rational(&x, 0.0, 128.0).unwrap(), (x.clone(), 0.0));
    }

    #[test]
    fn test_output_length() {
        let x = tone(440.0, 44_100.0, 44_100);
        let (y, fs) = resample_rational(&x, 44_100.0, 16_000.0).unwrap();
        assert_eq!(fs, 16_000.0);
        assert_eq!(y.len(), 16_000);

        let x = tone(10.0, 256.0, 1001);
        let (y, _) = resample_rational(&x, 256.0, 128.0).unwrap();
        assert_eq!(y.len(), 501);
    }

    #[test]
    fn test_downsample_preserves_low_tone() {
        let fs = 1000.0;
        let x = tone(5.0, fs, 4000);
        let (y, new_fs) = resample_rational(&x, fs, 100.0).unwrap();
        assert_eq!(new_fs, 100.0);
        assert_eq!(y.len(), 400);
        // Compare against the ideal tone away from the edges
        for (i, v) in y.iter().enumerate().take(350).skip(50) {
            let ideal = (2.0 * PI * 5.0 * i as f64 / new_fs).sin();
            assert!((v - ideal).abs() < 0.05, "sample {}: {} vs {}", i, v, ideal);
        }
    }

    #[test]
    fn test_chunk_size_is_even_number_of_periods() {
        assert_eq!(chunk_size(1), 1024);
        assert_eq!(chunk_size(10), 1040);
        assert_eq!(chunk_size(125), 1250);
        assert_eq!(chunk_size(441), 1764);
        assert_eq!(chunk_size(4000), 8000);
    }

    #[test]
    fn test_filter_delay() {
        // Even period counts: centre tap lands on an output sample
        assert_eq!(filter_delay(1040, 104), Some(52));
        assert_eq!(filter_delay(1764, 640), Some(320));
        // Odd period counts leave a fractional delay
        assert_eq!(filter_delay(1030, 103), None);
        assert_eq!(filter_delay(1323, 480), None);
        assert_eq!(filter_delay(0, 0), None);
    }

    #[test]
    fn test_resampled_tone_is_phase_aligned() {
        for (fs, target, freq) in [
            (1000.0, 100.0, 2.0),
            (500.0, 128.0, 3.0),
            (44_100.0, 16_000.0, 440.0),
            (256.0, 128.0, 4.0),
            (100.0, 250.0, 1.5),
        ] {
            let n = (fs * 8.0) as usize;
            let x = tone(freq, fs, n);
            let (y, new_fs) = resample_rational(&x, fs, target).unwrap();
            let edge = y.len() / 8;
            for (i, v) in y.iter().enumerate().take(y.len() - edge).skip(edge) {
                let ideal = (2.0 * PI * freq * i as f64 / new_fs).sin();
                assert!(
                    (v - ideal).abs() < 0.01,
                    "{} -> {} Hz, sample {}: {} vs {}",
                    fs,
                    target,
                    i,
                    v,
                    ideal
                );
            }
        }
    }

    #[test]
    fn test_empty_signal() {
        let (y, fs) = resample_rational(&[], 256.0, 128.0).unwrap();
        assert!(y.is_empty());
        assert_eq!(fs, 128.0);
    }
}
