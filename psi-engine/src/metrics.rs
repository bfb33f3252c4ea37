//! Agreement metrics between calibrated predictions and proxy targets
//!
//! Every metric is `None` only when there is no finite data to score; none
//! of them is ever NaN.

use crate::stats;
use serde::Serialize;

/// Added to the target spread in the approximate R^2
const SPREAD_EPS: f64 = 1e-3;

/// Batch-level scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub r2: Option<f64>,
    pub mae: Option<f64>,
    pub delta_mean: Option<f64>,
}

impl Metrics {
    /// Score `predictions` against `targets`
    pub fn compute(targets: &[f64], predictions: &[f64]) -> Self {
        let deltas: Vec<f64> = finite_pairs(targets, predictions)
            .map(|(t, p)| (p - t).abs())
            .collect();
        Self {
            r2: bounded_r2(targets, predictions),
            mae: mean_absolute_error(targets, predictions),
            delta_mean: (!deltas.is_empty()).then(|| stats::mean(&deltas)),
        }
    }

    /// Fill every `None` field from `other`
    pub fn or(self, other: &Metrics) -> Self {
        Self {
            r2: self.r2.or(other.r2),
            mae: self.mae.or(other.mae),
            delta_mean: self.delta_mean.or(other.delta_mean),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.r2.is_none() && self.mae.is_none() && self.delta_mean.is_none()
    }
}

fn finite_pairs<'a>(a: &'a [f64], b: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(&x, &y)| (x, y))
}

/// Coefficient of determination clipped to `[0, 1]`
///
/// With fewer than two pairs, or constant targets, the ordinary R^2 is
/// undefined; `1 - mean|t - p| / (std(t) + 1e-3)` (clipped) stands in.
pub fn bounded_r2(targets: &[f64], predictions: &[f64]) -> Option<f64> {
    let (t, p): (Vec<f64>, Vec<f64>) = finite_pairs(targets, predictions).unzip();
    if t.is_empty() {
        return None;
    }

    let mean_t = stats::mean(&t);
    let ss_tot: f64 = t.iter().map(|v| (v - mean_t).powi(2)).sum();
    if t.len() >= 2 && ss_tot > 0.0 {
        let ss_res: f64 = t.iter().zip(&p).map(|(a, b)| (a - b).powi(2)).sum();
        let r2 = 1.0 - ss_res / ss_tot;
        if r2.is_finite() {
            return Some(r2.clamp(0.0, 1.0));
        }
    }

    let mad = t.iter().zip(&p).map(|(a, b)| (a - b).abs()).sum::<f64>() / t.len() as f64;
    let approx = 1.0 - mad / (stats::std_dev(&t) + SPREAD_EPS);
    Some(stats::finite_or_zero(approx).clamp(0.0, 1.0))
}

/// Mean absolute error over finite pairs
pub fn mean_absolute_error(targets: &[f64], predictions: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = finite_pairs(targets, predictions).map(|(t, p)| (t - p).abs()).collect();
    (!errors.is_empty()).then(|| stats::mean(&errors))
}
