//! Target functions and their parameter descriptors.
//!
//! A function is never reflected on at call time. When the user selects it,
//! it is wrapped once into a [`TargetFunction`], which pairs the callable with
//! the ordered names of its fit parameters.

use ndarray::Array1;
use std::fmt;
use std::sync::Arc;

use crate::error::{FitError, Result};

/// Where a callable came from, for callables defined in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    /// Source text that defines the callable when executed.
    pub text: String,

    /// Name of the definition inside `text`.
    pub entry_point: String,
}

/// A model function `f(x, p1, ..., pn)`.
pub trait Callable: Send + Sync {
    /// Evaluate the function at a single `x`.
    fn call(&self, x: f64, params: &[f64]) -> f64;

    /// Formal argument names, independent variable first, if the callable
    /// carries that metadata. Bare closures do not.
    fn signature(&self) -> Option<Vec<String>> {
        None
    }

    /// The source the callable was defined from, if any.
    fn source(&self) -> Option<FunctionSource> {
        None
    }
}

type NativeFn = dyn Fn(f64, &[f64]) -> f64 + Send + Sync;

/// A callable backed by a Rust closure.
#[derive(Clone)]
pub struct NativeFunction {
    func: Arc<NativeFn>,
    signature: Option<Vec<String>>,
}

impl NativeFunction {
    /// Wrap a closure without signature metadata.
    ///
    /// Such a function cannot be introspected; use
    /// [`NativeFunction::with_signature`] to make it selectable.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            signature: None,
        }
    }

    /// Wrap a closure together with its formal argument names, `x` first.
    ///
    /// # Examples
    ///
    /// ```
    /// use actfit::function::{NativeFunction, TargetFunction};
    ///
    /// let line = NativeFunction::with_signature(|x, p| p[0] * x + p[1], &["x", "slope", "offset"]);
    /// let target = TargetFunction::new("line", line).unwrap();
    /// assert_eq!(target.parameter_names(), &["slope", "offset"]);
    /// assert_eq!(target.eval(2.0, &[3.0, 1.0]), 7.0);
    /// ```
    pub fn with_signature<F, S>(func: F, signature: &[S]) -> Self
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
        S: AsRef<str>,
    {
        Self {
            func: Arc::new(func),
            signature: Some(signature.iter().map(|s| s.as_ref().to_string()).collect()),
        }
    }
}

impl Callable for NativeFunction {
    fn call(&self, x: f64, params: &[f64]) -> f64 {
        (self.func)(x, params)
    }

    fn signature(&self) -> Option<Vec<String>> {
        self.signature.clone()
    }
}

/// Extracts fit parameter names from a callable.
pub struct FunctionIntrospector;

impl FunctionIntrospector {
    /// Names of all formal arguments after the first.
    ///
    /// The first argument is reserved for the independent variable. Fails
    /// when the callable carries no signature or declares no arguments.
    pub fn parameter_names(func: &dyn Callable) -> Result<Vec<String>> {
        let signature = func.signature().ok_or_else(|| {
            FitError::Introspection("function exposes no parameter metadata".to_string())
        })?;

        match signature.split_first() {
            Some((_, params)) => Ok(params.to_vec()),
            None => Err(FitError::Introspection(
                "function declares no independent variable".to_string(),
            )),
        }
    }
}

/// A callable plus its ordered parameter names, built once at selection time.
#[derive(Clone)]
pub struct TargetFunction {
    name: String,
    callable: Arc<dyn Callable>,
    parameter_names: Vec<String>,
}

impl TargetFunction {
    /// Introspect `callable` and wrap it.
    pub fn new<C: Callable + 'static>(name: &str, callable: C) -> Result<Self> {
        Self::from_arc(name, Arc::new(callable))
    }

    pub fn from_arc(name: &str, callable: Arc<dyn Callable>) -> Result<Self> {
        let parameter_names = FunctionIntrospector::parameter_names(callable.as_ref())?;
        Ok(Self {
            name: name.to_string(),
            callable,
            parameter_names,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_names.len()
    }

    pub fn source(&self) -> Option<FunctionSource> {
        self.callable.source()
    }

    /// Evaluate at one point.
    pub fn eval(&self, x: f64, params: &[f64]) -> f64 {
        self.callable.call(x, params)
    }

    /// Evaluate at every point of `xs`.
    pub fn eval_many(&self, xs: &Array1<f64>, params: &[f64]) -> Array1<f64> {
        xs.mapv(|x| self.callable.call(x, params))
    }
}

impl fmt::Debug for TargetFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetFunction")
            .field("name", &self.name)
            .field("parameter_names", &self.parameter_names)
            .finish()
    }
}
