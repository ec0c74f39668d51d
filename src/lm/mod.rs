//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the bounded nonlinear least-squares solver behind
//! [`crate::engine::FitEngine`]. Without finite bounds it runs the classic
//! Levenberg-Marquardt iteration; with finite bounds it runs a trust-region
//! reflective variant in Coleman-Li scaled variables.

// Include module declarations and re-exports
pub mod algorithm;
pub mod bounds;
pub mod config;
pub mod convergence;
pub mod step;
pub mod trust_region;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, LmResult};
pub use bounds::BoxConstraints;
pub use config::{LmConfig, Strategy};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use step::{LmStep, StepResult};
pub use trust_region::TrustRegion;
