//! # Covariance Matrix Calculations
//!
//! Functions for calculating covariance matrices from Jacobian matrices in
//! nonlinear least-squares optimization.

use nalgebra::SVD;
use ndarray::{Array1, Array2};

use crate::utils::matrix_convert::ndarray_to_nalgebra;

/// Residual variance `cost / (m - n)`, or `None` without spare degrees of freedom.
pub fn residual_variance(cost: f64, n_points: usize, n_params: usize) -> Option<f64> {
    (n_points > n_params).then(|| cost / (n_points - n_params) as f64)
}

/// Calculate covariance matrix from Jacobian matrix.
///
/// The covariance matrix is estimated as
///   covar = s² · pinv(JᵀJ)
/// where `s²` is the residual variance. The pseudo-inverse is taken through
/// the SVD of `J`, dropping singular values below `ε · max(m, n) · σ_max`, so
/// a rank-deficient Jacobian still yields a finite matrix.
///
/// With no spare degrees of freedom (`m <= n`) the covariance cannot be
/// estimated and every entry is `+inf`.
pub fn calculate_covariance(jacobian: &Array2<f64>, cost: f64) -> Array2<f64> {
    let (m, n) = jacobian.dim();
    let Some(s_sq) = residual_variance(cost, m, n) else {
        return Array2::from_elem((n, n), f64::INFINITY);
    };

    let svd = SVD::new(ndarray_to_nalgebra(jacobian), false, true);
    let Some(v_t) = svd.v_t else {
        return Array2::from_elem((n, n), f64::INFINITY);
    };

    let sigma_max = svd.singular_values.iter().fold(0.0_f64, |a, &s| a.max(s));
    let threshold = f64::EPSILON * m.max(n) as f64 * sigma_max;

    let mut covar = Array2::zeros((n, n));
    for (k, &sigma) in svd.singular_values.iter().enumerate() {
        if sigma <= threshold {
            continue;
        }
        let weight = s_sq / (sigma * sigma);
        for i in 0..n {
            for j in 0..n {
                covar[[i, j]] += v_t[(k, i)] * v_t[(k, j)] * weight;
            }
        }
    }
    covar
}

/// Calculate correlation matrix from covariance matrix.
///
/// correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 && denom.is_finite() {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Extract standard errors from the covariance matrix.
///
/// Standard errors are the square roots of the diagonal elements; negative
/// diagonal entries (numerical noise) give zero.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
