//! Problem definition trait and the curve-fitting problem.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem to be solved with the Levenberg-Marquardt algorithm,
//! and [`CurveProblem`], which adapts a target function and a dataset to it.

use ndarray::{Array1, Array2};

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::function::TargetFunction;

/// A trait representing a nonlinear least squares problem.
pub trait Problem: Sync {
    /// Evaluate the residuals at the given parameters.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The default implementation uses forward finite differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

/// Residuals `f(x, p) - y` of a target function over a dataset.
pub struct CurveProblem<'a> {
    func: &'a TargetFunction,
    data: &'a Dataset,
}

impl<'a> CurveProblem<'a> {
    pub fn new(func: &'a TargetFunction, data: &'a Dataset) -> Self {
        Self { func, data }
    }
}

impl Problem for CurveProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        if params.len() != self.func.parameter_count() {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                self.func.parameter_count(),
                params.len()
            )));
        }

        let p = params.to_vec();
        Ok(self
            .data
            .iter()
            .map(|(x, y)| self.func.eval(x, &p) - y)
            .collect())
    }

    fn parameter_count(&self) -> usize {
        self.func.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.data.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        #[cfg(feature = "parallel")]
        if self.residual_count() >= crate::utils::parallel::PARALLEL_THRESHOLD {
            return crate::utils::parallel::jacobian_parallel(self, params, None);
        }
        crate::utils::finite_difference::jacobian(self, params, None)
    }
}
