//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! Unbounded problems run the classic damped Gauss-Newton iteration. When a
//! bound is finite, the damped step is solved in Coleman-Li scaled variables
//! and taken reflectively, so every iterate stays strictly inside the bounds
//! box and components held by a bound stop at it.

use ndarray::{Array1, Array2};
use std::fmt;
use tracing::{debug, trace};

use crate::error::{FitError, Result};
use crate::problem::Problem;

use super::bounds::{BoxConstraints, ScaledModel};
use super::config::{LmConfig, Strategy};
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::step::LmStep;
use super::trust_region::TrustRegion;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Jacobian at the solution
    pub jacobian: Array2<f64>,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of residual evaluations
    pub func_evals: usize,

    /// Why the iteration stopped
    pub status: ConvergenceStatus,

    /// Whether the trust-region reflective iteration ran
    pub bounded: bool,
}

impl LmResult {
    /// Whether the optimization succeeded
    pub fn success(&self) -> bool {
        self.status.is_converged()
    }
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success())?;
        writeln!(f, "  Message: {}", self.status.description())?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the bound handling strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Minimize the sum of squared residuals without bounds.
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n = initial_params.len();
        let unbounded = BoxConstraints::new(
            Array1::from_elem(n, f64::NEG_INFINITY),
            Array1::from_elem(n, f64::INFINITY),
        );
        self.run(problem, initial_params, &unbounded)
    }

    /// Minimize the sum of squared residuals subject to `lower <= p <= upper`.
    ///
    /// The initial guess must lie inside the bounds.
    ///
    /// # Returns
    ///
    /// The final state, converged or not. Callers decide whether an
    /// unconverged result is an error.
    pub fn minimize_bounded<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
        lower: Array1<f64>,
        upper: Array1<f64>,
    ) -> Result<LmResult> {
        let n = initial_params.len();
        if lower.len() != n || upper.len() != n {
            return Err(FitError::DimensionMismatch(format!(
                "{} initial values, {} lower bounds, {} upper bounds",
                n,
                lower.len(),
                upper.len()
            )));
        }

        let constraints = BoxConstraints::new(lower, upper);
        if !constraints.contains(&initial_params) {
            return Err(FitError::InvalidBounds(format!(
                "initial guess {} lies outside the bounds",
                initial_params
            )));
        }
        self.run(problem, initial_params, &constraints)
    }

    fn run<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
        constraints: &BoxConstraints,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let bounded = match self.config.strategy {
            Strategy::Auto => constraints.is_active(),
            Strategy::TrustRegionReflective => true,
            Strategy::LevenbergMarquardt if constraints.is_active() => {
                return Err(FitError::InvalidBounds(
                    "plain Levenberg-Marquardt cannot honour finite bounds".to_string(),
                ));
            }
            Strategy::LevenbergMarquardt => false,
        };

        let criteria = ConvergenceCriteria::new(
            self.config.xtol,
            self.config.ftol,
            self.config.gtol,
            self.config.max_iterations,
        );
        let mut trust_region = TrustRegion::from_config(&self.config);

        let mut params = if bounded {
            constraints.to_interior(&initial_params)
        } else {
            initial_params
        };
        let mut residuals = problem.eval(&params)?;
        let mut cost: f64 = residuals.iter().map(|r| r.powi(2)).sum();
        let mut func_evals = 1;
        let mut iterations = 0;

        if !cost.is_finite() {
            return Err(FitError::Convergence(
                "residuals are not finite at the initial guess".to_string(),
            ));
        }

        let status = loop {
            let jacobian = problem.jacobian(&params)?;
            func_evals += n_params;
            let j_t_r = jacobian.t().dot(&residuals);

            // Bounded runs solve in Coleman-Li scaled variables.
            let scaled = if bounded {
                let scaling = constraints.scaling(&params, &j_t_r);
                let model = ScaledModel::new(&jacobian, &j_t_r, &scaling);
                Some((scaling, model))
            } else {
                None
            };
            let gradient_norm = match &scaled {
                Some((scaling, _)) => scaling.gradient_norm(&j_t_r),
                None => j_t_r.iter().fold(0.0_f64, |acc, g| acc.max(g.abs())),
            };

            let status = criteria.check_point(cost, gradient_norm, iterations);
            if status.is_terminated() {
                break status;
            }
            iterations += 1;

            let (system, rhs) = match &scaled {
                Some((_, model)) => (model.hessian.clone(), model.gradient.clone()),
                None => (jacobian.t().dot(&jacobian), j_t_r),
            };
            let theta = (1.0 - gradient_norm).max(0.995);

            // Inner loop: raise damping until a step is accepted.
            let step_status = loop {
                let Some(step) = LmStep::calculate_step(&system, &rhs, trust_region.lambda) else {
                    trust_region.increase();
                    if trust_region.is_saturated() {
                        break ConvergenceStatus::DampingSaturated;
                    }
                    continue;
                };

                let (new_params, predicted) = match &scaled {
                    Some((scaling, model)) => {
                        let trial =
                            constraints.select_step(&params, model, scaling, &step.step, theta);
                        (
                            constraints.strictly_feasible(&(&params + &trial.step)),
                            trial.predicted_reduction,
                        )
                    }
                    None => (&params + &step.step, step.predicted_reduction),
                };
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost: f64 = new_residuals.iter().map(|r| r.powi(2)).sum();

                // NaN for a worse or non-finite trial, which update_lambda rejects
                let gain = if new_cost.is_finite() && new_cost <= cost {
                    TrustRegion::gain_ratio(cost, new_cost, predicted)
                } else {
                    f64::NAN
                };
                trace!(lambda = trust_region.lambda, cost, new_cost, gain, "trial step");

                if trust_region.update_lambda(gain) {
                    let status = criteria.check_step(&params, &new_params, cost, new_cost);
                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    break status;
                }

                // A rejected step this small means no further progress is possible.
                if ConvergenceCriteria::relative_step(&params, &new_params) < criteria.xtol {
                    break ConvergenceStatus::ParameterConvergence;
                }
                if trust_region.is_saturated() {
                    break ConvergenceStatus::DampingSaturated;
                }
            };

            if step_status.is_terminated() {
                break step_status;
            }
        };

        debug!(
            iterations,
            func_evals,
            cost,
            status = status.description(),
            "Levenberg-Marquardt finished"
        );

        let jacobian = problem.jacobian(&params)?;
        Ok(LmResult {
            params,
            residuals,
            cost,
            jacobian,
            iterations,
            func_evals,
            status,
            bounded,
        })
    }
}
