//! # Uncertainty Calculation
//!
//! Parameter uncertainties for a converged fit, derived from the Jacobian at
//! the solution:
//!
//! - Covariance matrix estimation scaled by the residual variance
//! - Standard errors and the correlation matrix derived from it

mod covariance;

pub use covariance::{
    calculate_correlation, calculate_covariance, residual_variance,
    standard_errors_from_covariance,
};
