//! Affine calibration of predictions toward observed proxies
//!
//! A least-squares slope with a small ridge, clamped to `[0.6, 1.4]` and
//! shrunk toward the identity map. Small batches shrink harder.

use crate::stats;
use serde::Serialize;
use tracing::debug;

/// Ridge added to the prediction variance in the slope estimate
const SLOPE_RIDGE: f64 = 1e-2;
const SLOPE_MIN: f64 = 0.6;
const SLOPE_MAX: f64 = 1.4;
/// Shrinkage toward identity for batches of at most `SMALL_BATCH` pairs
const SMALL_BATCH_SHRINK: f64 = 0.35;
const SHRINK: f64 = 0.2;
const SMALL_BATCH: usize = 4;

/// `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AffineMap {
    pub slope: f64,
    pub intercept: f64,
}

impl AffineMap {
    pub const IDENTITY: AffineMap = AffineMap {
        slope: 1.0,
        intercept: 0.0,
    };

    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn apply_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.apply(x)).collect()
    }
}

impl Default for AffineMap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Fit the calibration map of `predictions` against `targets`
///
/// Only index-aligned pairs where both values are finite take part.
pub fn fit(predictions: &[f64], targets: &[f64]) -> AffineMap {
    let (p, t): (Vec<f64>, Vec<f64>) = predictions
        .iter()
        .zip(targets)
        .filter(|(p, t)| p.is_finite() && t.is_finite())
        .map(|(&p, &t)| (p, t))
        .unzip();

    match p.len() {
        0 => AffineMap::IDENTITY,
        1 => AffineMap {
            slope: 1.0,
            intercept: t[0] - p[0],
        },
        n => {
            let (mp, mt) = (stats::mean(&p), stats::mean(&t));
            let (mut cross, mut var) = (0.0, 0.0);
            for (pi, ti) in p.iter().zip(&t) {
                cross += (pi - mp) * (ti - mt);
                var += (pi - mp) * (pi - mp);
            }
            let slope = (cross / (var + SLOPE_RIDGE)).clamp(SLOPE_MIN, SLOPE_MAX);
            let intercept = mt - slope * mp;

            let shrink = if n <= SMALL_BATCH { SMALL_BATCH_SHRINK } else { SHRINK };
            AffineMap {
                slope: slope * (1.0 - shrink) + shrink,
                intercept: intercept * (1.0 - shrink),
            }
        }
    }
}

/// Fit the map and apply it to `predictions`
///
/// Returns `(adjusted, slope, intercept)`.
pub fn calibrate(predictions: &[f64], targets: &[f64]) -> (Vec<f64>, f64, f64) {
    let map = fit(predictions, targets);
    debug!(pairs = predictions.len().min(targets.len()), slope = map.slope, intercept = map.intercept, "Calibration fitted");
    (map.apply_all(predictions), map.slope, map.intercept)
}
