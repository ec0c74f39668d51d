//! Integration tests for saving and restoring fits

// Portable fit artifacts
mod artifact;

// The legacy name -> [value, covariance row] file
mod store;
