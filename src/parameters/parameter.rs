//! A single named fit parameter.

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};

/// A fit parameter: the value a slider edits plus the box the solver honours.
///
/// `bounds.min <= value <= bounds.max` is only a display expectation. The
/// value is stored as given; the solver enforces the bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: f64,
    bounds: Bounds,
}

impl Parameter {
    /// Create a new parameter with the given name, value, and bounds
    ///
    /// # Examples
    ///
    /// ```
    /// use actfit::parameters::{Bounds, Parameter};
    ///
    /// let param = Parameter::new("amplitude", 1.0, Bounds::new(0.0, 10.0).unwrap());
    /// assert_eq!(param.name(), "amplitude");
    /// assert_eq!(param.value(), 1.0);
    /// ```
    pub fn new(name: &str, value: f64, bounds: Bounds) -> Self {
        Self {
            name: name.to_string(),
            value,
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    /// Set the value without clamping it.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Replace both bounds at once.
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), BoundsError> {
        self.bounds = Bounds::new(min, max)?;
        Ok(())
    }

    /// Whether the current value lies inside the bounds.
    pub fn is_within_bounds(&self) -> bool {
        self.bounds.is_within_bounds(self.value)
    }

    /// Slider position of the current value, `0.0` at `min` and `1.0` at `max`.
    pub fn slider_position(&self) -> f64 {
        self.bounds.position_of(self.value)
    }
}
