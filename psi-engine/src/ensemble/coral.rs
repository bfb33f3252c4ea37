//! Correlation alignment (CORAL)
//!
//! Re-colours the synthetic rows so their mean and covariance match the
//! real batch: `(Xs - mean(Xs)) Cs^-1/2 Ct^1/2 + mean(Xt)`.

use super::{Row, DIM};
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Ridge added to both covariances before taking fractional powers
const COV_RIDGE: f64 = 1e-3;
/// Eigenvalue floor for the fractional powers
const EIGEN_FLOOR: f64 = 1e-12;

fn to_matrix(rows: &[Row]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), DIM, |i, j| rows[i][j])
}

/// Column means and sample covariance (ddof = 1) plus `COV_RIDGE * I`
fn moments(x: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let n = x.nrows();
    let mean = DVector::from_fn(DIM, |j, _| x.column(j).mean());
    let mut centered = x.clone();
    for mut row in centered.row_iter_mut() {
        row -= mean.transpose();
    }
    let denom = (n.saturating_sub(1)).max(1) as f64;
    let cov = centered.transpose() * &centered / denom + DMatrix::identity(DIM, DIM) * COV_RIDGE;
    (mean, cov)
}

/// `m^p` for a symmetric positive semi-definite `m`
fn symmetric_power(m: DMatrix<f64>, p: f64) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(m);
    let scaled = eigen.eigenvalues.map(|l| l.max(EIGEN_FLOOR).powf(p));
    &eigen.eigenvectors * DMatrix::from_diagonal(&scaled) * eigen.eigenvectors.transpose()
}

/// Align `source` rows to the second-order statistics of `target`
///
/// Either side with fewer than two rows has no covariance; `source` is
/// returned unchanged.
pub fn align(source: &[Row], target: &[Row]) -> Vec<Row> {
    if source.len() < 2 || target.len() < 2 {
        return source.to_vec();
    }

    let xs = to_matrix(source);
    let (mean_s, cov_s) = moments(&xs);
    let (mean_t, cov_t) = moments(&to_matrix(target));

    let transform = symmetric_power(cov_s, -0.5) * symmetric_power(cov_t, 0.5);

    let mut centered = xs;
    for mut row in centered.row_iter_mut() {
        row -= mean_s.transpose();
    }
    let aligned = centered * transform;

    aligned
        .row_iter()
        .map(|row| {
            let mut out = [0.0; DIM];
            for (j, v) in out.iter_mut().enumerate() {
                *v = row[j] + mean_t[j];
            }
            out
        })
        .collect()
}
