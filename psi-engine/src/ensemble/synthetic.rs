//! Synthetic training prior
//!
//! Rows are drawn uniformly over the model input space and labelled with a
//! fixed closed-form response plus Gaussian noise.

use super::{Row, DIM};
use psi_common::{Error, Result};
use rand::rngs::StdRng;
use rand::Rng;
use statrs::distribution::Normal;

/// Coefficients of the generating response:
/// `c0 exp(-c1 g) + c2 A0 + c3 n + c4 b + c5 lam + c6`
pub const PRIOR_COEFFS: [f64; 7] = [2.1, 1.48, 0.80, -1.21, 0.50, 0.026, 8.15];

/// Standard deviation of the label noise
pub const LABEL_NOISE_STD: f64 = 0.04;

/// Upper bound of each input column (lower bound is 0)
const COLUMN_RANGES: [f64; DIM] = [3.0, 1.0, 1.0, 1.0, 2.0];

/// Synthetic design matrix and labels
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub x: Vec<Row>,
    pub y: Vec<f64>,
}

/// Noise-free response of the generating model
pub fn prior_response(row: &Row) -> f64 {
    let c = PRIOR_COEFFS;
    c[0] * (-c[1] * row[0]).exp() + c[2] * row[1] + c[3] * row[2] + c[4] * row[3] + c[5] * row[4] + c[6]
}

/// Draw `n` labelled rows
pub fn generate(n: usize, rng: &mut StdRng) -> Result<SyntheticData> {
    let noise = Normal::new(0.0, LABEL_NOISE_STD).map_err(|e| Error::Model(format!("Label noise: {}", e)))?;

    // Column by column, so each feature consumes a contiguous run of draws
    let mut x = vec![[0.0; DIM]; n];
    for (col, &hi) in COLUMN_RANGES.iter().enumerate() {
        for row in x.iter_mut() {
            row[col] = rng.gen_range(0.0..hi);
        }
    }

    let y = x.iter().map(|row| prior_response(row) + rng.sample(noise)).collect();

    Ok(SyntheticData { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_rows_within_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        let data = generate(500, &mut rng).unwrap();
        assert_eq!(data.x.len(), 500);
        assert_eq!(data.y.len(), 500);
        for row in &data.x {
            for (v, hi) in row.iter().zip(COLUMN_RANGES) {
                assert!(*v >= 0.0 && *v < hi);
            }
        }
    }

    #[test]
    fn test_labels_follow_prior() {
        let mut rng = StdRng::seed_from_u64(7);
        let data = generate(2000, &mut rng).unwrap();
        let residuals: Vec<f64> = data.x.iter().zip(&data.y).map(|(r, y)| y - prior_response(r)).collect();
        let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
        let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / residuals.len() as f64;
        assert!(mean.abs() < 0.01);
        assert!((var.sqrt() - LABEL_NOISE_STD).abs() < 0.005);
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = generate(50, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = generate(50, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_prior_at_origin() {
        assert!((prior_response(&[0.0; 5]) - (2.1 + 8.15)).abs() < 1e-12);
    }
}
