//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! This module computes the damped Gauss-Newton step, which blends the
//! Gauss-Newton and gradient descent directions.

use ndarray::{Array1, Array2};

use crate::utils::matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The calculated step vector
    pub step: Array1<f64>,

    /// The predicted reduction in cost function value
    pub predicted_reduction: f64,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    /// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr`.
    ///
    /// Returns `None` when the damped system cannot be solved, in which case
    /// the caller raises λ and retries.
    pub fn calculate_step(j_t_j: &Array2<f64>, j_t_r: &Array1<f64>, lambda: f64) -> Option<StepResult> {
        let mut augmented = j_t_j.clone();
        for i in 0..augmented.nrows() {
            augmented[[i, i]] += lambda * j_t_j[[i, i]].max(1e-12);
        }

        let a = ndarray_to_nalgebra(&augmented);
        let b = -ndarray_vec_to_nalgebra(j_t_r);

        let solution = match a.clone().cholesky() {
            Some(chol) => chol.solve(&b),
            None => a.lu().solve(&b)?,
        };
        if solution.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let step = nalgebra_vec_to_ndarray(&solution);
        let predicted_reduction = Self::predicted_reduction(j_t_j, j_t_r, &step);
        Some(StepResult {
            step,
            predicted_reduction,
        })
    }

    /// Reduction of `‖r + Jδ‖²` relative to `‖r‖²` under the linear model.
    pub fn predicted_reduction(j_t_j: &Array2<f64>, j_t_r: &Array1<f64>, step: &Array1<f64>) -> f64 {
        -(2.0 * step.dot(j_t_r) + step.dot(&j_t_j.dot(step)))
    }
}
