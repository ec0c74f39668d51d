//! Configuration options for the Levenberg-Marquardt algorithm.
//!
//! This module defines the configuration options for the solver: iteration
//! budget, convergence tolerances, the damping schedule and how bounds are
//! handled.

use serde::{Deserialize, Serialize};

/// How the solver treats parameter bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Plain Levenberg-Marquardt when every bound is infinite, trust-region
    /// reflective otherwise.
    #[default]
    Auto,

    /// Unconstrained Levenberg-Marquardt. Rejected when a bound is finite.
    LevenbergMarquardt,

    /// Coleman-Li scaled steps, reflected off the bounds box when they
    /// would leave it.
    TrustRegionReflective,
}

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of iterations. Default: 200
    pub max_iterations: usize,

    /// Tolerance for relative change in cost. Default: 1e-10
    pub ftol: f64,

    /// Tolerance for relative change in parameter values. Default: 1e-10
    pub xtol: f64,

    /// Tolerance for the max-norm of the gradient. Default: 1e-10
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Bound handling. Default: Auto
    pub strategy: Strategy,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            strategy: Strategy::default(),
        }
    }
}
