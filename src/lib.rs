//! # actfit
//!
//! `actfit` is the core of an interactive curve-fitting tool: a user picks a
//! model function, loads a dataset, nudges parameters and bounds by hand,
//! restricts the x-window, runs a bounded Levenberg-Marquardt fit and finally
//! accepts the result.
//!
//! The library provides:
//! - A [`session::FitSession`] state machine that owns the fit configuration
//!   and reports every committed change to its observers
//! - A bounded nonlinear least-squares [`engine::FitEngine`] with covariance
//!   estimation
//! - A small [`source`] language for defining model functions and data
//! - Persistence of accepted fits as portable [`artifact`]s and in the
//!   legacy [`store`] format
//!
//! ## Basic Usage
//!
//! ```
//! use actfit::session::{FitSession, SessionState};
//! use actfit::source::{SourceEnvironment, DEMO_SOURCE};
//!
//! let mut env = SourceEnvironment::with_seed(7);
//! env.exec(DEMO_SOURCE).unwrap();
//!
//! let mut session = FitSession::default();
//! session.on_data_loaded(env.dataset("xs", "data").unwrap()).unwrap();
//! session.on_function_selected(env.function("f").unwrap()).unwrap();
//! session.on_run_fit().unwrap();
//!
//! assert_eq!(session.state(), SessionState::Converged);
//! ```

pub mod artifact;
pub mod data;
pub mod engine;
pub mod error;
pub mod function;
pub mod lm;
pub mod parameters;
pub mod problem;
pub mod session;
pub mod source;
pub mod store;
pub mod uncertainty;
pub mod utils;

// Re-exports for convenience
pub use data::{Dataset, FitRange, RangeFilter};
pub use engine::{FitEngine, FitResult};
pub use error::{FitError, Result};
pub use function::{Callable, NativeFunction, TargetFunction};
pub use lm::{LevenbergMarquardt, LmConfig};
pub use parameters::{Bounds, Parameter, ParameterState};
pub use session::{FitSession, SessionConfig, SessionEvent, SessionState};
pub use source::SourceEnvironment;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
