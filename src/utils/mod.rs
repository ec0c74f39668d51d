//! Utility functions and helpers for the actfit library.

pub mod finite_difference;
pub mod matrix_convert;
pub mod ordered_map;
#[cfg(feature = "parallel")]
pub mod parallel;

// Re-export commonly used utilities
pub use finite_difference::jacobian;
pub use matrix_convert::{
    nalgebra_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};
#[cfg(feature = "parallel")]
pub use parallel::jacobian_parallel;
