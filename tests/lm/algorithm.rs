//! Integration tests for the Levenberg-Marquardt algorithm.

use actfit::lm::{ConvergenceStatus, LevenbergMarquardt, LmConfig, Strategy};
use actfit::problem::Problem;
use actfit::{FitError, Result};
use approx::assert_relative_eq;
use ndarray::{array, Array1, Array2};

/// Test Problem: Rosenbrock function as two residuals
struct RosenbrockProblem;

impl Problem for RosenbrockProblem {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let x = params[0];
        let y = params[1];
        Ok(array![1.0 - x, 10.0 * (y - x.powi(2))])
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let x = params[0];
        Ok(array![[-1.0, 0.0], [-20.0 * x, 10.0]])
    }
}

/// Test Problem: exponential decay `a * exp(-b * x)`, finite-difference Jacobian
struct ExponentialProblem {
    x_data: Array1<f64>,
    y_data: Array1<f64>,
}

impl ExponentialProblem {
    fn new(a: f64, b: f64) -> Self {
        let x_data = Array1::linspace(0.0, 4.0, 40);
        let y_data = x_data.mapv(|x| a * (-b * x).exp());
        Self { x_data, y_data }
    }
}

impl Problem for ExponentialProblem {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        if params.len() != 2 {
            return Err(FitError::DimensionMismatch(format!(
                "Expected 2 parameters, got {}",
                params.len()
            )));
        }
        Ok(&self.x_data.mapv(|x| params[0] * (-params[1] * x).exp()) - &self.y_data)
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        self.x_data.len()
    }
}

/// Test Problem: straight line `a * x + b` against `y = 3x - 2` on `[0, 5]`
struct LineProblem {
    x_data: Array1<f64>,
    y_data: Array1<f64>,
}

impl LineProblem {
    fn new() -> Self {
        let x_data = Array1::linspace(0.0, 5.0, 30);
        let y_data = x_data.mapv(|x| 3.0 * x - 2.0);
        Self { x_data, y_data }
    }

    /// Least-squares slope with the intercept pinned at zero
    fn slope_through_origin(&self) -> f64 {
        self.x_data.dot(&self.y_data) / self.x_data.dot(&self.x_data)
    }
}

impl Problem for LineProblem {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(&self.x_data * params[0] + params[1] - &self.y_data)
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        self.x_data.len()
    }
}

#[test]
fn test_rosenbrock() {
    let result = LevenbergMarquardt::new()
        .minimize(&RosenbrockProblem, array![-1.2, 1.0])
        .unwrap();

    assert!(result.success(), "{}", result);
    assert!(!result.bounded);
    assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-5);
    assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-5);
    assert!(result.cost < 1e-10);
}

#[test]
fn test_exponential_with_numeric_jacobian() {
    let problem = ExponentialProblem::new(3.0, 0.7);
    let result = LevenbergMarquardt::new()
        .minimize(&problem, array![1.0, 1.0])
        .unwrap();

    assert!(result.success());
    assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-5);
    assert_relative_eq!(result.params[1], 0.7, epsilon = 1e-5);
    assert_eq!(result.jacobian.dim(), (40, 2));
}

#[test]
fn test_bounds_keep_iterates_inside() {
    // The unconstrained optimum a = 3 lies above the upper bound
    let problem = ExponentialProblem::new(3.0, 0.7);
    let result = LevenbergMarquardt::new()
        .minimize_bounded(&problem, array![1.0, 1.0], array![0.0, 0.0], array![2.0, 5.0])
        .unwrap();

    assert!(result.success(), "{}", result);
    assert!(result.bounded);
    assert!(result.params[0] <= 2.0);
    assert_relative_eq!(result.params[0], 2.0, epsilon = 1e-6);
    assert!(result.params[1] >= 0.0 && result.params[1] <= 5.0);
}

#[test]
fn test_intercept_held_at_lower_bound() {
    // Unconstrained optimum (3, -2); with b >= 0 the optimum is b = 0 and
    // the through-origin slope for a.
    let problem = LineProblem::new();
    let result = LevenbergMarquardt::new()
        .minimize_bounded(&problem, array![1.0, 1.0], array![0.0, 0.0], array![10.0, 10.0])
        .unwrap();

    let slope = problem.slope_through_origin();
    assert_relative_eq!(slope, 2.4102, epsilon = 1e-4);
    let optimum_cost = problem.eval_cost(&array![slope, 0.0]).unwrap();

    assert!(result.success(), "{}", result);
    assert_relative_eq!(result.params[0], slope, epsilon = 1e-6);
    assert!(result.params[1] >= 0.0 && result.params[1] < 1e-6);
    assert_relative_eq!(result.cost, optimum_cost, max_relative = 1e-6);
}

#[test]
fn test_start_on_bound_leaves_it_when_gradient_points_inside() {
    // Both parameters start on a bound; the optimum (3, -2) is interior
    let problem = LineProblem::new();
    let result = LevenbergMarquardt::new()
        .minimize_bounded(&problem, array![0.0, -5.0], array![0.0, -5.0], array![10.0, 10.0])
        .unwrap();

    assert!(result.success(), "{}", result);
    assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-6);
    assert_relative_eq!(result.params[1], -2.0, epsilon = 1e-6);
}

#[test]
fn test_initial_guess_outside_bounds() {
    let problem = ExponentialProblem::new(3.0, 0.7);
    let err = LevenbergMarquardt::new()
        .minimize_bounded(&problem, array![5.0, 1.0], array![0.0, 0.0], array![2.0, 5.0])
        .unwrap_err();
    assert!(matches!(err, FitError::InvalidBounds(_)));
}

#[test]
fn test_bound_length_mismatch() {
    let problem = ExponentialProblem::new(3.0, 0.7);
    let err = LevenbergMarquardt::new()
        .minimize_bounded(&problem, array![1.0, 1.0], array![0.0], array![2.0, 5.0])
        .unwrap_err();
    assert!(matches!(err, FitError::DimensionMismatch(_)));
}

#[test]
fn test_plain_strategy_refuses_bounds() {
    let problem = ExponentialProblem::new(3.0, 0.7);
    let solver = LevenbergMarquardt::new().with_strategy(Strategy::LevenbergMarquardt);
    assert!(solver
        .minimize_bounded(&problem, array![1.0, 1.0], array![0.0, 0.0], array![10.0, 5.0])
        .is_err());
}

#[test]
fn test_iteration_budget() {
    let config = LmConfig {
        max_iterations: 1,
        ..LmConfig::default()
    };
    let problem = ExponentialProblem::new(3.0, 0.7);
    let result = LevenbergMarquardt::with_config(config)
        .minimize(&problem, array![1.0, 1.0])
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.status, ConvergenceStatus::MaxIterationsReached);
    assert_eq!(result.iterations, 1);
}
