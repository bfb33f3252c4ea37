//! L2-regularised linear regression with an unpenalised intercept

use super::{Row, DIM};
use nalgebra::{SMatrix, SVector};
use psi_common::{Error, Result};

type Gram = SMatrix<f64, DIM, DIM>;
type Coeffs = SVector<f64, DIM>;

#[derive(Debug, Clone, PartialEq)]
pub struct Ridge {
    pub coef: [f64; DIM],
    pub intercept: f64,
}

impl Ridge {
    /// Solve `(Xc'Xc + alpha I) w = Xc'yc` on centred data
    ///
    /// # Errors
    /// `Error::Model` when the training set is empty or the normal equations
    /// are singular (only possible with `alpha == 0`).
    pub fn fit(x: &[Row], y: &[f64], alpha: f64) -> Result<Self> {
        let n = x.len().min(y.len());
        if n == 0 {
            return Err(Error::Model("Ridge fit on an empty training set".to_string()));
        }

        let x_mean = Coeffs::from_fn(|j, _| x[..n].iter().map(|r| r[j]).sum::<f64>() / n as f64);
        let y_mean = y[..n].iter().sum::<f64>() / n as f64;

        let mut gram = Gram::identity() * alpha;
        let mut rhs = Coeffs::zeros();
        for (row, &target) in x[..n].iter().zip(&y[..n]) {
            let xc = Coeffs::from_fn(|j, _| row[j] - x_mean[j]);
            gram += xc * xc.transpose();
            rhs += xc * (target - y_mean);
        }

        let w = match gram.cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => gram
                .lu()
                .solve(&rhs)
                .ok_or_else(|| Error::Model("Ridge normal equations are singular".to_string()))?,
        };

        let intercept = y_mean - w.dot(&x_mean);
        let mut coef = [0.0; DIM];
        coef.copy_from_slice(w.as_slice());
        Ok(Self { coef, intercept })
    }

    pub fn predict_row(&self, row: &Row) -> f64 {
        self.intercept + self.coef.iter().zip(row).map(|(c, v)| c * v).sum::<f64>()
    }

    pub fn predict(&self, rows: &[Row]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}
