//! # Parameter System
//!
//! Named fit parameters with bounds, kept in the order the target function
//! declares them.
//!
//! - [`Parameter`]: a value plus the [`Bounds`] the solver must respect
//! - [`ParameterState`]: the ordered collection the session edits and the
//!   solver reads its initial guess and box constraints from
//!
//! ## Example Usage
//!
//! ```rust
//! use actfit::parameters::{Bounds, ParameterState};
//!
//! let mut params = ParameterState::initialize(&["m", "b", "c"], 1.0, Bounds::new(0.0, 10.0).unwrap()).unwrap();
//! params.set_value("m", 2.0).unwrap();
//! params.set_bounds("c", -1.0, 1.0).unwrap();
//!
//! assert_eq!(params.values().to_vec(), vec![2.0, 1.0, 1.0]);
//! assert_eq!(params.lower_bounds().to_vec(), vec![0.0, 0.0, -1.0]);
//! ```

pub mod bounds;
pub mod parameter;
pub mod state;

// Re-export key types
pub use bounds::{Bounds, BoundsError};
pub use parameter::Parameter;
pub use state::ParameterState;
