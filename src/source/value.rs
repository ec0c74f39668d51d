use ndarray::{Array1, Zip};

use super::SourceError;

/// Result of evaluating an expression: a number or a sequence of numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(Array1<f64>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array1<f64>> {
        match self {
            Value::Scalar(_) => None,
            Value::Array(a) => Some(a),
        }
    }

    /// View as an array, a scalar becoming a single element.
    pub fn into_array(self) -> Array1<f64> {
        match self {
            Value::Scalar(v) => Array1::from_elem(1, v),
            Value::Array(a) => a,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Array(_) => "array",
        }
    }

    /// Apply `f` element-wise.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(v)),
            Value::Array(a) => Value::Array(a.mapv_into(f)),
        }
    }

    /// Combine two values element-wise with numpy-style broadcasting.
    ///
    /// Scalars and one-element arrays stretch to the other operand; arrays of
    /// any other differing lengths fail with `ShapeMismatch`.
    pub fn zip_with(&self, other: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, SourceError> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
            (Value::Scalar(a), Value::Array(b)) => Ok(Value::Array(b.mapv(|y| f(*a, y)))),
            (Value::Array(a), Value::Scalar(b)) => Ok(Value::Array(a.mapv(|x| f(x, *b)))),
            (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
                Ok(Value::Array(Zip::from(a).and(b).map_collect(|&x, &y| f(x, y))))
            }
            (Value::Array(a), Value::Array(b)) if a.len() == 1 => {
                Ok(Value::Array(b.mapv(|y| f(a[0], y))))
            }
            (Value::Array(a), Value::Array(b)) if b.len() == 1 => {
                Ok(Value::Array(a.mapv(|x| f(x, b[0]))))
            }
            (Value::Array(a), Value::Array(b)) => Err(SourceError::ShapeMismatch {
                left: a.len(),
                right: b.len(),
            }),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Array1<f64>> for Value {
    fn from(a: Array1<f64>) -> Self {
        Value::Array(a)
    }
}
