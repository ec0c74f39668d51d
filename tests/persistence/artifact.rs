//! Integration tests for fit artifacts

use actfit::artifact::{self, FitArtifact};
use actfit::session::FitSession;
use actfit::source::{SourceEnvironment, DEMO_SOURCE};
use actfit::FitError;
use ndarray::Array1;

use crate::test_helpers::{scratch_path, sine_function};

fn accepted_demo() -> (SourceEnvironment, actfit::session::AcceptedFit) {
    let mut env = SourceEnvironment::with_seed(21);
    env.exec(DEMO_SOURCE).unwrap();
    let mut session = FitSession::default();
    session.on_data_loaded(env.dataset("xs", "data").unwrap()).unwrap();
    session.on_function_selected(env.function("f").unwrap()).unwrap();
    session.on_run_fit().unwrap();
    let accepted = session.on_accept().unwrap();
    (env, accepted)
}

#[test]
fn test_round_trip_is_bit_exact() {
    let (env, accepted) = accepted_demo();
    let bytes = artifact::dumps(&accepted.function, &accepted.parameters).unwrap();
    let (function, parameters) = artifact::loads(&bytes).unwrap();

    assert_eq!(parameters, accepted.parameters.to_pairs());
    assert_eq!(function.parameter_names(), accepted.function.parameter_names());

    let values: Vec<f64> = parameters.iter().map(|(_, v)| *v).collect();
    for &x in env.sequence("xs").unwrap().iter() {
        let original = accepted.function.eval(x, &values);
        let restored = function.eval(x, &values);
        assert_eq!(original.to_bits(), restored.to_bits());
    }
}

#[test]
fn test_round_trip_through_file() {
    let (_, accepted) = accepted_demo();
    let path = scratch_path("artifact");
    artifact::dump(
        &accepted.function,
        &accepted.parameters,
        std::fs::File::create(&path).unwrap(),
    )
    .unwrap();
    let (function, parameters) = artifact::load(std::fs::File::open(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(function.name(), "f");
    assert_eq!(parameters.len(), 3);
    for (name, value) in &parameters {
        assert_eq!(accepted.result.get(name), Some(*value));
    }
}

#[test]
fn test_function_depending_on_data_survives_reload() {
    let mut env = SourceEnvironment::with_seed(8);
    env.exec(
        "jitter = randn(4)\n\
         shift = mean(jitter)\n\
         def base(x, a) = a * x + shift\n\
         def model(x, a, w) = base(x, a) * exp(-w * x)\n\
         unrelated = rand(50)",
    )
    .unwrap();
    let model = env.function("model").unwrap();
    let pairs = vec![("a".to_string(), 1.25), ("w".to_string(), 0.3)];
    let saved = FitArtifact::new(&model, pairs.clone()).unwrap();
    assert!(!saved.source.contains("unrelated"));

    let bytes = serde_json::to_vec(&saved).unwrap();
    let (restored, parameters) = artifact::loads(&bytes).unwrap();
    assert_eq!(parameters, pairs);
    for x in Array1::linspace(-2.0, 2.0, 17).iter() {
        assert_eq!(
            model.eval(*x, &[1.25, 0.3]).to_bits(),
            restored.eval(*x, &[1.25, 0.3]).to_bits()
        );
    }
}

#[test]
fn test_native_functions_cannot_be_saved() {
    let mut session = FitSession::default();
    session.on_function_selected(sine_function()).unwrap();
    let err = artifact::dumps(&sine_function(), session.parameters()).unwrap_err();
    assert!(matches!(err, FitError::Serialization(_)));
}

#[test]
fn test_rejects_foreign_documents() {
    assert!(matches!(artifact::loads(b"[1, 2, 3]"), Err(FitError::Json(_))));

    let tampered = br#"{"version": 1, "source": "def f(x, a) = a * x", "entry_point": "f", "parameters": {"b": 1.0}}"#;
    assert!(matches!(artifact::loads(tampered), Err(FitError::Serialization(_))));

    let hostile = br#"{"version": 1, "source": "import os", "entry_point": "f", "parameters": {}}"#;
    assert!(matches!(artifact::loads(hostile), Err(FitError::Source(_))));
}

#[test]
fn test_redefined_helper_reloads_after_its_data() {
    // `base` keeps its first slot when redefined, ahead of `k`
    let mut env = SourceEnvironment::new();
    env.exec("def base(x, a) = a * x; k = 2; def base(x, a) = a * x + k; def g(x, a) = base(x, a)")
        .unwrap();
    let g = env.function("g").unwrap();
    let pairs = vec![("a".to_string(), 1.5)];
    let saved = FitArtifact::new(&g, pairs.clone()).unwrap();
    let k_at = saved.source.find("k = ").unwrap();
    let base_at = saved.source.find("def base").unwrap();
    assert!(k_at < base_at, "{}", saved.source);

    let bytes = serde_json::to_vec(&saved).unwrap();
    let (restored, parameters) = artifact::loads(&bytes).unwrap();
    assert_eq!(parameters, pairs);
    assert_eq!(restored.eval(2.0, &[1.5]), 5.0);
    assert_eq!(restored.eval(2.0, &[1.5]).to_bits(), g.eval(2.0, &[1.5]).to_bits());
}
