//! Parallel finite-difference Jacobian for large datasets.

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use super::finite_difference::{check_residuals, step_for, DEFAULT_EPSILON};
use crate::error::Result;
use crate::problem::Problem;

/// Residual count from which [`jacobian_parallel`] is worth its overhead.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// Compute the Jacobian matrix using forward finite differences in parallel.
///
/// Each column is computed on the rayon pool. Produces the same matrix as
/// [`super::finite_difference::jacobian`].
pub fn jacobian_parallel<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();

    let residuals = problem.eval(params)?;
    check_residuals(problem, &residuals)?;

    let columns = (0..n_params)
        .into_par_iter()
        .map(|j| {
            let eps_j = step_for(params[j], eps);
            let mut params_perturbed = params.clone();
            params_perturbed[j] += eps_j;

            let residuals_perturbed = problem.eval(&params_perturbed)?;
            Ok((&residuals_perturbed - &residuals) / eps_j)
        })
        .collect::<Result<Vec<Array1<f64>>>>()?;

    let mut jac = Array2::zeros((residuals.len(), n_params));
    for (j, column) in columns.iter().enumerate() {
        jac.column_mut(j).assign(column);
    }
    Ok(jac)
}
