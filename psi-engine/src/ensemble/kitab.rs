//! Closed-form "kitab" collapse model
//!
//! `ct = A exp(-alpha g) + B A0 + C n + D b + E lam + F`
//!
//! Fitted by damped least squares (Levenberg-Marquardt with Marquardt
//! diagonal scaling) from a fixed starting point. Any fit failure falls back
//! to the starting point itself.

use super::Row;
use nalgebra::{SMatrix, SVector};
use thiserror::Error;
use tracing::debug;

pub const N_PARAMS: usize = 7;

/// `[A, alpha, B, C, D, E, F]`
pub type KitabParams = [f64; N_PARAMS];

/// Starting point of every fit and the fallback on failure
pub const KITAB_SEED: KitabParams = [2.1, 1.48, 0.8, -1.2, 0.5, 0.02, 8.15];

type Normal = SMatrix<f64, N_PARAMS, N_PARAMS>;
type Step = SVector<f64, N_PARAMS>;

/// Relative cost reduction and relative step size that end the iteration
const FTOL: f64 = 1.49012e-8;
const XTOL: f64 = 1.49012e-8;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e16;
/// Floor of the diagonal scaling, for parameters the data does not touch
const DIAG_FLOOR: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("{rows} rows cannot determine 7 parameters")]
    TooFewRows { rows: usize },

    #[error("Non-finite value in fit inputs or residuals")]
    NonFinite,

    #[error("No convergence within {evals} function evaluations")]
    NotConverged { evals: usize },
}

/// Evaluate the model on one feature row
pub fn evaluate(params: &KitabParams, row: &Row) -> f64 {
    let [a, alpha, b, c, d, e, f] = *params;
    a * (-alpha * row[0]).exp() + b * row[1] + c * row[2] + d * row[3] + e * row[4] + f
}

/// Partial derivatives of [`evaluate`] with respect to each parameter
fn jacobian_row(params: &KitabParams, row: &Row) -> Step {
    let decay = (-params[1] * row[0]).exp();
    Step::from([
        decay,
        -params[0] * row[0] * decay,
        row[1],
        row[2],
        row[3],
        row[4],
        1.0,
    ])
}

fn cost(params: &KitabParams, x: &[Row], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(r, t)| (evaluate(params, r) - t).powi(2)).sum()
}

/// Least-squares fit of the kitab model to `(x, y)`
///
/// `max_evals` bounds the number of cost evaluations.
pub fn fit(x: &[Row], y: &[f64], max_evals: usize) -> Result<KitabParams, FitError> {
    let n = x.len().min(y.len());
    if n < N_PARAMS {
        return Err(FitError::TooFewRows { rows: n });
    }
    let (x, y) = (&x[..n], &y[..n]);
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let mut p = KITAB_SEED;
    let mut current = cost(&p, x, y);
    let mut evals = 1;
    if !current.is_finite() {
        return Err(FitError::NonFinite);
    }
    let mut lambda = LAMBDA_INIT;

    loop {
        let mut jtj = Normal::zeros();
        let mut jtr = Step::zeros();
        for (row, &target) in x.iter().zip(y) {
            let j = jacobian_row(&p, row);
            let r = evaluate(&p, row) - target;
            jtj += j * j.transpose();
            jtr += j * r;
        }
        if !jtr.iter().all(|v| v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        if jtr.amax() <= f64::EPSILON * current.max(1.0) {
            return Ok(p);
        }

        let diag = Step::from_fn(|i, _| jtj[(i, i)].max(DIAG_FLOOR));

        // Raise the damping until a step lowers the cost
        loop {
            if evals >= max_evals {
                return Err(FitError::NotConverged { evals });
            }
            if lambda > LAMBDA_MAX {
                // No descent direction left: stationary at working precision
                return Ok(p);
            }

            let mut damped = jtj;
            for i in 0..N_PARAMS {
                damped[(i, i)] += lambda * diag[i];
            }
            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                continue;
            };
            let step = chol.solve(&(-jtr));

            let mut trial = p;
            for (t, s) in trial.iter_mut().zip(step.iter()) {
                *t += s;
            }
            let trial_cost = cost(&trial, x, y);
            evals += 1;

            if trial_cost.is_finite() && trial_cost < current {
                let reduction = current - trial_cost;
                let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                let step_norm = step.norm();
                p = trial;
                current = trial_cost;
                lambda = (lambda / 10.0).max(f64::MIN_POSITIVE);

                if reduction <= FTOL * (current + reduction) || step_norm <= XTOL * (p_norm + XTOL) {
                    return Ok(p);
                }
                break;
            }
            lambda *= 10.0;
        }
    }
}

/// [`fit`], falling back to [`KITAB_SEED`] on any failure
pub fn fit_or_seed(x: &[Row], y: &[f64], max_evals: usize) -> KitabParams {
    match fit(x, y, max_evals) {
        Ok(params) if params.iter().all(|v| v.is_finite()) => params,
        Ok(_) => {
            debug!("Kitab fit produced non-finite coefficients, using seed");
            KITAB_SEED
        }
        Err(e) => {
            debug!(rows = x.len(), "Kitab fit failed, using seed: {}", e);
            KITAB_SEED
        }
    }
}
