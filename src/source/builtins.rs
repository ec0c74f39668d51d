//! Constants and built-in functions of the source language.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::ops::RangeInclusive;

use super::{SourceError, Value};

/// Longest sequence a builtin may allocate.
const MAX_LENGTH: usize = 10_000_000;

pub(crate) fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

/// Accepted argument counts, `None` for names that are not builtins.
pub(crate) fn arity(name: &str) -> Option<RangeInclusive<usize>> {
    let range = match name {
        "sin" | "cos" | "tan" | "exp" | "log" | "ln" | "log10" | "sqrt" | "abs" => 1..=1,
        "sum" | "mean" | "len" => 1..=1,
        "min" | "max" => 1..=2,
        "linspace" => 3..=3,
        "arange" => 1..=3,
        "zeros" | "ones" | "rand" | "randn" => 1..=1,
        _ => return None,
    };
    Some(range)
}

/// Builtins that draw from the environment's random generator.
pub(crate) fn is_random(name: &str) -> bool {
    matches!(name, "rand" | "randn")
}

pub(crate) fn describe_arity(range: &RangeInclusive<usize>) -> String {
    if range.start() == range.end() {
        range.start().to_string()
    } else {
        format!("{} to {}", range.start(), range.end())
    }
}

fn invalid(function: &str, message: impl Into<String>) -> SourceError {
    SourceError::InvalidArgument {
        function: function.to_string(),
        message: message.into(),
    }
}

fn scalar_arg(function: &str, value: &Value) -> Result<f64, SourceError> {
    value
        .as_scalar()
        .ok_or_else(|| invalid(function, format!("expected a scalar, got an {}", value.kind())))
}

fn count_arg(function: &str, value: &Value) -> Result<usize, SourceError> {
    let n = scalar_arg(function, value)?;
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return Err(invalid(
            function,
            format!("expected a non-negative whole number, got {}", n),
        ));
    }
    if n > MAX_LENGTH as f64 {
        return Err(invalid(function, format!("length {} is too large", n)));
    }
    Ok(n as usize)
}

fn reduce(function: &str, value: &Value, f: fn(f64, f64) -> f64) -> Result<Value, SourceError> {
    match value {
        Value::Scalar(v) => Ok(Value::Scalar(*v)),
        Value::Array(a) => a
            .iter()
            .copied()
            .reduce(f)
            .map(Value::Scalar)
            .ok_or_else(|| invalid(function, "empty sequence")),
    }
}

fn arange(args: &[Value]) -> Result<Value, SourceError> {
    let scalars = args
        .iter()
        .map(|a| scalar_arg("arange", a))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match scalars.as_slice() {
        [stop] => (0.0, *stop, 1.0),
        [start, stop] => (*start, *stop, 1.0),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(invalid("arange", "expected 1 to 3 arguments")),
    };
    if step == 0.0 || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
        return Err(invalid("arange", "bounds and step must be finite, step non-zero"));
    }
    let length = ((stop - start) / step).ceil();
    if length > MAX_LENGTH as f64 {
        return Err(invalid("arange", format!("length {} is too large", length)));
    }
    Ok(Value::Array(Array1::range(start, stop, step)))
}

/// Call builtin `name`. `rng` is `None` where random builtins are not allowed.
pub(crate) fn call(
    name: &str,
    args: &[Value],
    rng: Option<&mut StdRng>,
) -> Result<Value, SourceError> {
    let expected = arity(name).ok_or_else(|| SourceError::UndefinedName {
        name: name.to_string(),
    })?;
    if !expected.contains(&args.len()) {
        return Err(SourceError::Arity {
            name: name.to_string(),
            expected: describe_arity(&expected),
            found: args.len(),
        });
    }

    let unary = |f: fn(f64) -> f64| Ok(args[0].clone().map(f));
    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "exp" => unary(f64::exp),
        "log" | "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "min" | "max" => {
            let f: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            match args {
                [single] => reduce(name, single, f),
                [a, b] => a.zip_with(b, f),
                _ => Err(invalid(name, "expected 1 or 2 arguments")),
            }
        }
        "sum" => Ok(Value::Scalar(args[0].clone().into_array().sum())),
        "mean" => Ok(Value::Scalar(
            args[0].clone().into_array().mean().unwrap_or(f64::NAN),
        )),
        "len" => match &args[0] {
            Value::Array(a) => Ok(Value::Scalar(a.len() as f64)),
            Value::Scalar(_) => Err(invalid(name, "a scalar has no length")),
        },
        "linspace" => {
            let start = scalar_arg(name, &args[0])?;
            let stop = scalar_arg(name, &args[1])?;
            let n = count_arg(name, &args[2])?;
            Ok(Value::Array(Array1::linspace(start, stop, n)))
        }
        "arange" => arange(args),
        "zeros" => Ok(Value::Array(Array1::zeros(count_arg(name, &args[0])?))),
        "ones" => Ok(Value::Array(Array1::ones(count_arg(name, &args[0])?))),
        "rand" | "randn" => {
            let n = count_arg(name, &args[0])?;
            let rng = rng.ok_or_else(|| {
                invalid(name, "random numbers are only available in data statements")
            })?;
            let values: Array1<f64> = if name == "rand" {
                (0..n).map(|_| rng.gen::<f64>()).collect()
            } else {
                (0..n).map(|_| StandardNormal.sample(&mut *rng)).collect()
            };
            Ok(Value::Array(values))
        }
        _ => Err(SourceError::UndefinedName {
            name: name.to_string(),
        }),
    }
}
