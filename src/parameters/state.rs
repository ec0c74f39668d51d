//! Ordered parameter collection for the currently selected function.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::FitResult;
use crate::error::{FitError, Result};
use crate::parameters::bounds::Bounds;
use crate::parameters::parameter::Parameter;

/// The single source of truth for fit parameters.
///
/// Parameters are kept in declaration order because that order lines up
/// positionally with the function's call signature. Every vector this type
/// hands to the solver follows that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    params: Vec<Parameter>,
}

impl ParameterState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// One parameter per name, all starting at `default_value` inside `default_bounds`.
    ///
    /// # Examples
    ///
    /// ```
    /// use actfit::parameters::{Bounds, ParameterState};
    ///
    /// let state = ParameterState::initialize(&["m", "b", "c"], 1.0, Bounds::new(0.0, 10.0).unwrap()).unwrap();
    /// assert_eq!(state.names(), vec!["m", "b", "c"]);
    /// assert_eq!(state.values().to_vec(), vec![1.0, 1.0, 1.0]);
    /// ```
    pub fn initialize<S: AsRef<str>>(
        names: &[S],
        default_value: f64,
        default_bounds: Bounds,
    ) -> Result<Self> {
        let mut params: Vec<Parameter> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if params.iter().any(|p| p.name() == name) {
                return Err(FitError::Introspection(format!(
                    "parameter '{}' is declared more than once",
                    name
                )));
            }
            params.push(Parameter::new(name, default_value, default_bounds));
        }
        debug!(count = params.len(), "initialized parameter state");
        Ok(Self { params })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.params
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| FitError::UnknownParameter(name.to_string()))
    }

    /// Update a value. Bounds are advisory here and the value is not clamped.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        self.get_mut(name)?.set_value(value);
        Ok(())
    }

    /// Replace the bounds of one parameter; `lower` must be below `upper`.
    pub fn set_bounds(&mut self, name: &str, lower: f64, upper: f64) -> Result<()> {
        self.get_mut(name)?.set_bounds(lower, upper)?;
        Ok(())
    }

    /// Current values in declaration order.
    pub fn values(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.value()).collect()
    }

    pub fn lower_bounds(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.min()).collect()
    }

    pub fn upper_bounds(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.max()).collect()
    }

    /// Overwrite every value from a fit result. Bounds are left alone.
    ///
    /// The result must carry a value for every parameter; otherwise nothing
    /// is changed.
    pub fn apply_fit_result(&mut self, result: &FitResult) -> Result<()> {
        let mut fitted = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let value = result
                .get(param.name())
                .ok_or_else(|| FitError::UnknownParameter(param.name().to_string()))?;
            fitted.push(value);
        }

        for (param, value) in self.params.iter_mut().zip(fitted) {
            param.set_value(value);
        }
        Ok(())
    }

    /// `(name, value)` pairs in declaration order.
    pub fn to_pairs(&self) -> Vec<(String, f64)> {
        self.params
            .iter()
            .map(|p| (p.name().to_string(), p.value()))
            .collect()
    }
}
