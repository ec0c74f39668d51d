//! Integration tests for SourceEnvironment

use actfit::source::{SourceEnvironment, SourceError, Value, DEMO_SOURCE};
use actfit::FitError;
use approx::assert_relative_eq;
use ndarray::array;

fn env_with(text: &str) -> SourceEnvironment {
    let mut env = SourceEnvironment::with_seed(3);
    env.exec(text).unwrap();
    env
}

fn innermost(error: &SourceError) -> &SourceError {
    match error {
        SourceError::AtLine { error, .. } => innermost(error),
        other => other,
    }
}

#[test]
fn test_demo_source() {
    let env = env_with(DEMO_SOURCE);
    assert_eq!(env.callables(), vec!["f"]);
    assert_eq!(env.non_callables(), vec!["xs", "data"]);

    let data = env.dataset("xs", "data").unwrap();
    assert_eq!(data.len(), 100);
    // sin(x) plus uniform noise in [0, 0.3)
    for (x, y) in data.iter() {
        let noise = y - x.sin();
        assert!((0.0..0.3).contains(&noise), "noise {} at {}", noise, x);
    }
}

#[test]
fn test_introspected_names_follow_declaration_order() {
    let env = env_with("def g(t, zeta, alpha, mid) = zeta * t + alpha - mid");
    let g = env.function("g").unwrap();
    assert_eq!(g.parameter_names(), &["zeta", "alpha", "mid"]);
    assert_eq!(g.parameter_count(), 3);
}

#[test]
fn test_statement_forms() {
    let env = env_with(
        "# peaks\n\
         width = 0.5; centre = 2\n\
         def peak(x, a): return a * exp(-((x - centre) / width)^2)\n\
         grid = arange(0, 4, 0.5)\n\
         heights = peak(grid, 3)",
    );
    assert_eq!(env.callables(), vec!["peak"]);
    assert_eq!(env.non_callables(), vec!["width", "centre", "grid", "heights"]);
    assert_eq!(env.value("centre"), Some(&Value::Scalar(2.0)));

    let heights = env.sequence("heights").unwrap();
    assert_eq!(heights.len(), 8);
    assert_relative_eq!(heights[4], 3.0);
    assert_relative_eq!(heights[3], 3.0 * (-1.0_f64).exp());
}

#[test]
fn test_operator_semantics() {
    let env = env_with("a = 2 ^ 3 ^ 2; b = -2 ^ 2; c = 10 - 4 - 3; d = 1 / 0; s = [1, 2] * [3, 4] + 1");
    assert_eq!(env.value("a"), Some(&Value::Scalar(512.0)));
    assert_eq!(env.value("b"), Some(&Value::Scalar(-4.0)));
    assert_eq!(env.value("c"), Some(&Value::Scalar(3.0)));
    assert_eq!(env.value("d"), Some(&Value::Scalar(f64::INFINITY)));
    assert_eq!(env.sequence("s").unwrap(), array![4.0, 9.0]);
}

#[test]
fn test_builtins() {
    let env = env_with(
        "xs = linspace(0, 1, 5)\n\
         n = len(xs); total = sum(xs); avg = mean(xs)\n\
         lo = min(xs); hi = max(xs, 0.5)\n\
         z = zeros(3) + ones(3)\n\
         noise = randn(1000)",
    );
    assert_eq!(env.sequence("xs").unwrap(), array![0.0, 0.25, 0.5, 0.75, 1.0]);
    assert_eq!(env.value("n"), Some(&Value::Scalar(5.0)));
    assert_eq!(env.value("total"), Some(&Value::Scalar(2.5)));
    assert_eq!(env.value("avg"), Some(&Value::Scalar(0.5)));
    assert_eq!(env.value("lo"), Some(&Value::Scalar(0.0)));
    assert_eq!(env.sequence("hi").unwrap(), array![0.5, 0.5, 0.5, 0.75, 1.0]);
    assert_eq!(env.sequence("z").unwrap(), array![1.0, 1.0, 1.0]);

    let noise = env.sequence("noise").unwrap();
    let mean = noise.mean().unwrap();
    assert!(mean.abs() < 0.15, "mean {}", mean);
}

#[test]
fn test_shape_mismatch() {
    let mut env = SourceEnvironment::with_seed(0);
    let err = env.exec("bad = [1, 2, 3] + [1, 2]").unwrap_err();
    assert!(matches!(
        innermost(&err),
        SourceError::ShapeMismatch { left: 3, right: 2 }
    ));
}

#[test]
fn test_function_bodies_are_checked() {
    let cases = [
        "def f(x, a) = a * y",
        "def f(x, a) = a * rand(1)",
        "def f(x, a) = sin(x, a)",
        "def f(x, a, a) = a",
    ];
    for text in cases {
        let mut env = SourceEnvironment::with_seed(0);
        assert!(env.exec(text).is_err(), "accepted '{}'", text);
        assert!(env.callables().is_empty());
    }
}

#[test]
fn test_failed_exec_is_transactional() {
    let mut env = env_with("keep = 1");
    let err = env.exec("a = 2\nb = missing + 1\nc = 3").unwrap_err();
    assert!(matches!(err, SourceError::AtLine { line: 2, .. }));
    assert_eq!(env.non_callables(), vec!["keep"]);
    assert_eq!(env.source(), "keep = 1");
}

#[test]
fn test_parse_errors_report_line() {
    let mut env = SourceEnvironment::with_seed(0);
    match env.exec("a = 1\nb = (2 +").unwrap_err() {
        SourceError::Parse { line, .. } => assert_eq!(line, 2),
        other => panic!("Expected Parse error, got {:?}", other),
    }
}

#[test]
fn test_lookup_errors_convert_to_fit_error() {
    let env = env_with("def f(x, a) = a * x; xs = [1, 2]; k = 3");
    assert!(matches!(
        env.function("xs"),
        Err(FitError::Source(SourceError::NotCallable { .. }))
    ));
    assert!(matches!(
        env.function("nope"),
        Err(FitError::Source(SourceError::UndefinedName { .. }))
    ));
    assert!(matches!(
        env.sequence("k"),
        Err(SourceError::NotASequence { .. })
    ));
    assert!(matches!(env.dataset("xs", "k"), Err(FitError::Source(_))));
}

#[test]
fn test_function_evaluation_errors_become_nan() {
    let env = env_with("def f(x, a) = a * [1, 2]");
    let f = env.function("f").unwrap();
    assert!(f.eval(1.0, &[2.0]).is_nan());
}

#[test]
fn test_reset() {
    let mut env = env_with(DEMO_SOURCE);
    let f = env.function("f").unwrap();
    env.reset();
    assert!(env.callables().is_empty());
    assert!(!env.contains("xs"));
    // functions handed out earlier keep working
    assert_eq!(f.eval(0.0, &[1.0, 1.0, 0.25]), 0.25);
}

#[test]
fn test_same_seed_same_data() {
    let a = env_with(DEMO_SOURCE);
    let b = env_with(DEMO_SOURCE);
    assert_eq!(a.sequence("data").unwrap(), b.sequence("data").unwrap());
}
