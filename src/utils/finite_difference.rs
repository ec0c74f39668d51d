//! Finite difference methods for numerical differentiation.
//!
//! Target functions are opaque callables, so every Jacobian the solver uses
//! is approximated here.

use crate::error::{FitError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step size for finite differences.
pub(crate) const DEFAULT_EPSILON: f64 = 1.490_116_119_384_765_6e-8; // sqrt(f64::EPSILON)

/// Step used for parameter `value`, scaled to its magnitude.
pub(crate) fn step_for(value: f64, eps: f64) -> f64 {
    eps * value.abs().max(1.0)
}

/// Check that the problem produced as many residuals as it announced.
pub(crate) fn check_residuals<P: Problem + ?Sized>(problem: &P, residuals: &Array1<f64>) -> Result<()> {
    if residuals.len() != problem.residual_count() {
        return Err(FitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            problem.residual_count(),
            residuals.len()
        )));
    }
    Ok(())
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The relative step size (optional)
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();

    let residuals = problem.eval(params)?;
    check_residuals(problem, &residuals)?;

    let mut jac = Array2::zeros((residuals.len(), n_params));

    for j in 0..n_params {
        let eps_j = step_for(params[j], eps);
        let mut params_perturbed = params.clone();
        params_perturbed[j] += eps_j;

        let residuals_perturbed = problem.eval(&params_perturbed)?;
        let column = (&residuals_perturbed - &residuals) / eps_j;
        jac.column_mut(j).assign(&column);
    }

    Ok(jac)
}
