//! Integration tests for FitEngine

use actfit::engine::FitEngine;
use actfit::function::{NativeFunction, TargetFunction};
use actfit::{Dataset, FitError};
use approx::assert_relative_eq;
use ndarray::{array, Array1};

use crate::test_helpers::{
    line_function, negative_intercept_dataset, noisy_sine_dataset, sine_dataset, sine_function,
    slope_through_origin,
};

fn open_bounds(n: usize) -> (Array1<f64>, Array1<f64>) {
    (
        Array1::from_elem(n, f64::NEG_INFINITY),
        Array1::from_elem(n, f64::INFINITY),
    )
}

#[test]
fn test_noiseless_sine_is_recovered() {
    let data = sine_dataset(2.0, 1.0, 0.5, 100);
    let (lower, upper) = open_bounds(3);
    let result = FitEngine::new()
        .fit(&sine_function(), &data, &array![1.0, 1.0, 1.0], &lower, &upper)
        .unwrap();

    assert_relative_eq!(result.get("m").unwrap(), 2.0, epsilon = 1e-3);
    assert_relative_eq!(result.get("b").unwrap(), 1.0, epsilon = 1e-3);
    assert_relative_eq!(result.get("c").unwrap(), 0.5, epsilon = 1e-3);
    assert_eq!(result.n_points, 100);
}

#[test]
fn test_noisy_sine_uncertainties() {
    let data = noisy_sine_dataset(2.0, 1.0, 0.5, 200, 0.05, 11);
    let result = FitEngine::new()
        .fit(
            &sine_function(),
            &data,
            &array![1.0, 1.0, 1.0],
            &array![0.0, 0.0, 0.0],
            &array![10.0, 10.0, 10.0],
        )
        .unwrap();

    let errors = result.standard_errors();
    for (i, (name, value)) in result.optimal_params().enumerate() {
        let truth = match name {
            "m" => 2.0,
            "b" => 1.0,
            _ => 0.5,
        };
        assert!(errors[i] > 0.0 && errors[i] < 0.05, "{} stderr {}", name, errors[i]);
        assert!((value - truth).abs() < 5.0 * errors[i] + 1e-3, "{} = {}", name, value);
    }

    let correlation = result.correlation();
    for i in 0..3 {
        assert_relative_eq!(correlation[[i, i]], 1.0, epsilon = 1e-12);
    }
    let variance = result.residual_variance().unwrap();
    assert!(variance > 0.0 && variance < 0.01);
}

#[test]
fn test_fit_leaves_inputs_untouched() {
    let data = sine_dataset(2.0, 1.0, 0.5, 50);
    let initial = array![1.0, 1.0, 1.0];
    let (lower, upper) = open_bounds(3);
    FitEngine::new()
        .fit(&sine_function(), &data, &initial, &lower, &upper)
        .unwrap();
    assert_eq!(initial, array![1.0, 1.0, 1.0]);
}

#[test]
fn test_initial_and_bounds_must_agree() {
    let data = sine_dataset(2.0, 1.0, 0.5, 50);
    let err = FitEngine::new()
        .fit(
            &sine_function(),
            &data,
            &array![1.0, 1.0, 1.0],
            &array![0.0, 0.0],
            &array![10.0, 10.0],
        )
        .unwrap_err();
    assert!(matches!(err, FitError::DimensionMismatch(_)));
}

#[test]
fn test_exactly_determined_fit_has_infinite_covariance() {
    let line = TargetFunction::new(
        "line",
        NativeFunction::with_signature(|x, p| p[0] * x + p[1], &["x", "a", "b"]),
    )
    .unwrap();
    let data = Dataset::new(array![1.0, 2.0], array![3.0, 5.0]).unwrap();
    let (lower, upper) = open_bounds(2);
    let result = FitEngine::new()
        .fit(&line, &data, &array![1.0, 1.0], &lower, &upper)
        .unwrap();

    assert_relative_eq!(result.get("a").unwrap(), 2.0, epsilon = 1e-8);
    assert_relative_eq!(result.get("b").unwrap(), 1.0, epsilon = 1e-8);
    assert!(result.covariance().iter().all(|v| v.is_infinite()));
    assert_eq!(result.residual_variance(), None);
}

#[test]
fn test_function_without_parameters() {
    let square = TargetFunction::new(
        "square",
        NativeFunction::with_signature(|x, _| x * x, &["x"]),
    )
    .unwrap();
    let data = sine_dataset(1.0, 1.0, 0.0, 10);
    let err = FitEngine::new()
        .fit(&square, &data, &Array1::zeros(0), &Array1::zeros(0), &Array1::zeros(0))
        .unwrap_err();
    assert!(matches!(err, FitError::DimensionMismatch(_)));
}

#[test]
fn test_optimum_on_lower_bound() {
    let data = negative_intercept_dataset();
    let result = FitEngine::new()
        .fit(
            &line_function(),
            &data,
            &array![1.0, 1.0],
            &array![0.0, 0.0],
            &array![10.0, 10.0],
        )
        .unwrap();

    let slope = slope_through_origin(&data);
    let optimum: f64 = data
        .iter()
        .map(|(x, y)| (slope * x - y).powi(2))
        .sum();
    assert_relative_eq!(result.get("a").unwrap(), slope, epsilon = 1e-6);
    assert!(result.get("b").unwrap() >= 0.0 && result.get("b").unwrap() < 1e-6);
    assert_relative_eq!(result.cost, optimum, max_relative = 1e-6);
}
