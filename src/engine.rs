//! Bounded curve fitting on top of the Levenberg-Marquardt solver.

use ndarray::{Array1, Array2};
use std::fmt;
use tracing::{info, warn};

use crate::data::Dataset;
use crate::error::{FitError, Result};
use crate::function::TargetFunction;
use crate::lm::{ConvergenceStatus, LevenbergMarquardt, LmConfig};
use crate::problem::CurveProblem;
use crate::uncertainty::{
    calculate_correlation, calculate_covariance, residual_variance,
    standard_errors_from_covariance,
};

/// Optimal parameters and their covariance from one successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    names: Vec<String>,
    params: Array1<f64>,
    covariance: Array2<f64>,

    /// Sum of squared residuals at the optimum
    pub cost: f64,

    /// Number of points the fit used
    pub n_points: usize,

    /// Solver iterations
    pub iterations: usize,

    /// Residual evaluations
    pub func_evals: usize,

    /// Why the solver stopped
    pub message: String,
}

impl FitResult {
    /// Assemble a result from ordered names, values and an `n x n` covariance.
    pub fn new(names: Vec<String>, params: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
        let n = names.len();
        if params.len() != n || covariance.dim() != (n, n) {
            return Err(FitError::DimensionMismatch(format!(
                "{} names, {} values, {:?} covariance",
                n,
                params.len(),
                covariance.dim()
            )));
        }
        Ok(Self {
            names,
            params,
            covariance,
            cost: 0.0,
            n_points: 0,
            iterations: 0,
            func_evals: 0,
            message: String::new(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Optimal values in parameter declaration order.
    pub fn values(&self) -> &Array1<f64> {
        &self.params
    }

    /// Optimal value of one parameter.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.params[i])
    }

    /// `(name, value)` pairs in declaration order.
    pub fn optimal_params(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.params.iter().copied())
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    pub fn standard_errors(&self) -> Array1<f64> {
        standard_errors_from_covariance(&self.covariance)
    }

    pub fn correlation(&self) -> Array2<f64> {
        calculate_correlation(&self.covariance)
    }

    /// Reduced chi-square, `None` without spare degrees of freedom.
    pub fn residual_variance(&self) -> Option<f64> {
        residual_variance(self.cost, self.n_points, self.names.len())
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  {}", self.message)?;
        writeln!(f, "  Points: {}  Iterations: {}  Cost: {:.6e}", self.n_points, self.iterations, self.cost)?;
        let errors = self.standard_errors();
        for (i, (name, value)) in self.optimal_params().enumerate() {
            writeln!(f, "  {:>12} = {:>+14.6e} +/- {:.3e}", name, value, errors[i])?;
        }
        Ok(())
    }
}

/// Runs bounded nonlinear least-squares fits of a target function.
#[derive(Debug, Clone, Default)]
pub struct FitEngine {
    solver: LevenbergMarquardt,
}

impl FitEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LmConfig) -> Self {
        Self {
            solver: LevenbergMarquardt::with_config(config),
        }
    }

    pub fn config(&self) -> &LmConfig {
        self.solver.config()
    }

    /// Fit `func` to `dataset` starting from `initial` inside `[lower, upper]`.
    ///
    /// Plain Levenberg-Marquardt runs when every bound is infinite, the
    /// reflective variant otherwise. The covariance is scaled by the residual
    /// variance at the optimum.
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` when the three vectors and the function's
    ///   parameter count disagree
    /// * `InvalidBounds` when a lower bound is not below its upper bound or
    ///   the initial guess lies outside the bounds
    /// * `Convergence` when the solver stops without converging
    pub fn fit(
        &self,
        func: &TargetFunction,
        dataset: &Dataset,
        initial: &Array1<f64>,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
    ) -> Result<FitResult> {
        let n = func.parameter_count();
        if n == 0 {
            return Err(FitError::DimensionMismatch(format!(
                "'{}' has no parameters to fit",
                func.name()
            )));
        }
        if initial.len() != n || lower.len() != n || upper.len() != n {
            return Err(FitError::DimensionMismatch(format!(
                "'{}' takes {} parameters but got {} initial values, {} lower bounds, {} upper bounds",
                func.name(),
                n,
                initial.len(),
                lower.len(),
                upper.len()
            )));
        }
        for (i, (lo, hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !(lo < hi) {
                return Err(FitError::InvalidBounds(format!(
                    "{}: lower bound {} must be below upper bound {}",
                    func.parameter_names()[i],
                    lo,
                    hi
                )));
            }
        }
        if dataset.is_empty() {
            return Err(FitError::MissingInput("no data points to fit".to_string()));
        }

        let problem = CurveProblem::new(func, dataset);
        let outcome = self.solver.minimize_bounded(
            &problem,
            initial.clone(),
            lower.clone(),
            upper.clone(),
        )?;

        if !outcome.success() {
            warn!(
                function = func.name(),
                iterations = outcome.iterations,
                cost = outcome.cost,
                "fit did not converge"
            );
            let reason = match outcome.status {
                ConvergenceStatus::MaxIterationsReached => format!(
                    "no convergence after {} iterations",
                    outcome.iterations
                ),
                status => status.description().to_string(),
            };
            return Err(FitError::Convergence(reason));
        }

        let covariance = calculate_covariance(&outcome.jacobian, outcome.cost);
        let mut result = FitResult::new(
            func.parameter_names().to_vec(),
            outcome.params,
            covariance,
        )?;
        result.cost = outcome.cost;
        result.n_points = dataset.len();
        result.iterations = outcome.iterations;
        result.func_evals = outcome.func_evals;
        result.message = format!(
            "{} ({})",
            outcome.status.description(),
            if outcome.bounded {
                "trust-region reflective"
            } else {
                "Levenberg-Marquardt"
            }
        );

        info!(
            function = func.name(),
            points = dataset.len(),
            iterations = result.iterations,
            cost = result.cost,
            "fit converged"
        );
        Ok(result)
    }
}
