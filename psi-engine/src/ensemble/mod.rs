//! Per-domain ensemble predictor
//!
//! A fresh model is trained for every domain batch:
//!
//! 1. draw the synthetic prior ([`synthetic`]);
//! 2. align it to the batch's feature statistics ([`coral`]) when the batch
//!    has at least two rows;
//! 3. fit the random forest on the aligned rows, then the ridge and the
//!    closed-form kitab model on the forest's in-sample predictions.
//!
//! `rf_ct` blends forest and ridge. `kitab_ct` and its 95 % interval come
//! from refitting the kitab model on bootstrap resamples of the batch
//! against `rf_ct`. All four are finally calibrated toward the batch's
//! collapse-time proxies.

pub mod coral;
pub mod forest;
pub mod kitab;
pub mod ridge;
pub mod synthetic;

use crate::calibration::{self, AffineMap};
use crate::features::FeatureVector;
use crate::metrics::Metrics;
use crate::stats;
use forest::{ForestParams, RandomForest};
use kitab::KitabParams;
use psi_common::config::ModelConfig;
use psi_common::{Domain, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use ridge::Ridge;
use serde::Serialize;
use tracing::{debug, info};

pub const DIM: usize = FeatureVector::DIM;

/// One model input row
pub type Row = [f64; DIM];

/// Feature vectors and proxy targets of one domain within one request
#[derive(Debug, Clone)]
pub struct DomainBatch {
    pub domain: Domain,
    pub vectors: Vec<FeatureVector>,
    /// `ct_proxy` of each row
    pub proxies: Vec<f64>,
}

impl DomainBatch {
    pub fn rows(&self) -> Vec<Row> {
        self.vectors.iter().map(|v| *v.as_array()).collect()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Trained forest + ridge + kitab coefficients
#[derive(Debug, Clone)]
pub struct EnsembleModel {
    forest: RandomForest,
    ridge: Ridge,
    kitab: KitabParams,
    rf_weight: f64,
}

impl EnsembleModel {
    /// Train on the synthetic prior, adapted to `real` rows
    pub fn train(real: &[Row], config: &ModelConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let prior = synthetic::generate(config.synthetic_samples, &mut rng)?;

        let x = if real.len() >= 2 {
            debug!(rows = real.len(), "Aligning synthetic prior to batch statistics");
            coral::align(&prior.x, real)
        } else {
            prior.x
        };

        let forest = RandomForest::fit(
            &x,
            &prior.y,
            &ForestParams {
                n_trees: config.n_trees,
                max_depth: config.max_depth,
                seed: config.seed,
            },
        );
        let forest_pred = forest.predict(&x);
        let ridge = Ridge::fit(&x, &forest_pred, config.ridge_alpha)?;
        let kitab = kitab::fit_or_seed(&x, &forest_pred, config.max_fit_evals);

        debug!(
            trees = forest.n_trees(),
            ridge_intercept = ridge.intercept,
            kitab = ?kitab,
            "Ensemble trained"
        );

        Ok(Self {
            forest,
            ridge,
            kitab,
            rf_weight: config.rf_weight,
        })
    }

    /// Forest/ridge blend
    pub fn predict_blend(&self, rows: &[Row]) -> Vec<f64> {
        let forest = self.forest.predict(rows);
        rows.iter()
            .zip(forest)
            .map(|(r, f)| self.rf_weight * f + (1.0 - self.rf_weight) * self.ridge.predict_row(r))
            .collect()
    }

    /// Closed-form evaluation of the trained kitab coefficients
    pub fn predict_kitab(&self, rows: &[Row]) -> Vec<f64> {
        rows.iter().map(|r| kitab::evaluate(&self.kitab, r)).collect()
    }

    pub fn kitab_params(&self) -> &KitabParams {
        &self.kitab
    }
}

/// Uncalibrated model outputs, one entry per batch row
#[derive(Debug, Clone, Default)]
pub struct RawPredictions {
    pub rf_ct: Vec<f64>,
    pub kitab_ct: Vec<f64>,
    pub kitab_lo: Vec<f64>,
    pub kitab_hi: Vec<f64>,
}

/// Calibrated outputs for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub rf_ct: f64,
    pub kitab_ct: f64,
    pub kitab_lo: f64,
    pub kitab_hi: f64,
    /// `|kitab_ct - ct_proxy|`
    pub delta_ct: f64,
}

/// Calibrated predictions and scores of one domain batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionBundle {
    pub domain: Domain,
    pub predictions: Vec<Prediction>,
    pub calibration: AffineMap,
    pub metrics: Metrics,
}

/// Bootstrap kitab refits: mean and 2.5 / 97.5 percentiles per row
///
/// Resample indices are drawn sequentially from one generator; the refits
/// then run in parallel.
fn bootstrap_kitab(rows: &[Row], rf_ct: &[f64], config: &ModelConfig) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = rows.len();
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    let resamples: Vec<Vec<usize>> = (0..config.bootstrap_runs)
        .map(|_| (0..n).map(|_| rng.gen_range(0..n)).collect())
        .collect();

    let runs: Vec<Vec<f64>> = resamples
        .par_iter()
        .map(|idx| {
            let x: Vec<Row> = idx.iter().map(|&i| rows[i]).collect();
            let y: Vec<f64> = idx.iter().map(|&i| rf_ct[i]).collect();
            let params = kitab::fit_or_seed(&x, &y, config.max_fit_evals);
            rows.iter().map(|r| kitab::evaluate(&params, r)).collect()
        })
        .collect();

    let mut mean = Vec::with_capacity(n);
    let mut lo = Vec::with_capacity(n);
    let mut hi = Vec::with_capacity(n);
    for i in 0..n {
        let column: Vec<f64> = runs.iter().map(|run| run[i]).collect();
        let m = stats::mean(&column);
        mean.push(m);
        lo.push(stats::percentile(&column, 2.5).unwrap_or(m).min(m));
        hi.push(stats::percentile(&column, 97.5).unwrap_or(m).max(m));
    }
    (mean, lo, hi)
}

/// Train a model for `batch` and predict every row, uncalibrated
pub fn train_and_predict(batch: &DomainBatch, config: &ModelConfig) -> Result<RawPredictions> {
    let rows = batch.rows();
    if rows.is_empty() {
        return Ok(RawPredictions::default());
    }

    let model = EnsembleModel::train(&rows, config)?;
    let rf_ct = model.predict_blend(&rows);

    let (kitab_ct, kitab_lo, kitab_hi) = if rows.len() >= 2 && config.bootstrap_runs > 0 {
        bootstrap_kitab(&rows, &rf_ct, config)
    } else {
        let closed = model.predict_kitab(&rows);
        (closed.clone(), closed.clone(), closed)
    };

    Ok(RawPredictions {
        rf_ct,
        kitab_ct,
        kitab_lo,
        kitab_hi,
    })
}

/// Train, predict, calibrate and score one domain batch
pub fn fit_and_predict(domain: Domain, vectors: &[FeatureVector], proxies: &[f64], config: &ModelConfig) -> Result<PredictionBundle> {
    let batch = DomainBatch {
        domain,
        vectors: vectors.to_vec(),
        proxies: proxies.to_vec(),
    };
    predict_batch(&batch, config)
}

/// [`train_and_predict`] followed by calibration and scoring
pub fn predict_batch(batch: &DomainBatch, config: &ModelConfig) -> Result<PredictionBundle> {
    let raw = train_and_predict(batch, config)?;

    let map = calibration::fit(&raw.kitab_ct, &batch.proxies);
    let predictions: Vec<Prediction> = (0..raw.kitab_ct.len())
        .map(|i| {
            let kitab_ct = map.apply(raw.kitab_ct[i]);
            let proxy = batch.proxies.get(i).copied().unwrap_or(f64::NAN);
            Prediction {
                rf_ct: map.apply(raw.rf_ct[i]),
                kitab_ct,
                kitab_lo: map.apply(raw.kitab_lo[i]),
                kitab_hi: map.apply(raw.kitab_hi[i]),
                delta_ct: stats::finite_or_zero((kitab_ct - proxy).abs()),
            }
        })
        .collect();

    let calibrated: Vec<f64> = predictions.iter().map(|p| p.kitab_ct).collect();
    let metrics = Metrics::compute(&batch.proxies, &calibrated);

    info!(
        domain = %batch.domain,
        rows = batch.len(),
        slope = map.slope,
        intercept = map.intercept,
        r2 = ?metrics.r2,
        "Domain batch predicted"
    );

    Ok(PredictionBundle {
        domain: batch.domain,
        predictions,
        calibration: map,
        metrics,
    })
}
