//! Integration tests for the legacy fit file

use actfit::store::{read_fit, FitStore, DEFAULT_FIT_FILE};
use actfit::session::FitSession;
use approx::assert_relative_eq;

use crate::test_helpers::{noisy_sine_dataset, scratch_path, sine_function};

#[test]
fn test_default_location() {
    assert_eq!(FitStore::default().path(), std::path::Path::new(DEFAULT_FIT_FILE));
}

#[test]
fn test_save_and_reuse_fit() {
    let mut session = FitSession::default();
    session
        .on_data_loaded(noisy_sine_dataset(2.0, 1.0, 0.5, 80, 0.05, 2))
        .unwrap();
    session.on_function_selected(sine_function()).unwrap();
    let result = session.on_run_fit().unwrap();

    let store = FitStore::new(scratch_path("store"));
    assert!(!store.exists());
    store.save_result(&result).unwrap();
    assert!(store.exists());

    let stored = store.load().unwrap();
    std::fs::remove_file(store.path()).unwrap();

    assert_eq!(stored.popt, *result.values());
    assert_eq!(stored.pcov, *result.covariance());
    let names: Vec<&str> = stored.values.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["m", "b", "c"]);

    // seed a fresh session with the stored values
    let mut next = FitSession::default();
    next.on_data_loaded(noisy_sine_dataset(2.0, 1.0, 0.5, 80, 0.05, 3))
        .unwrap();
    next.on_function_selected(sine_function()).unwrap();
    for (name, value) in &stored.values {
        next.on_parameter_edited(name, *value).unwrap();
    }
    let refit = next.on_run_fit().unwrap();
    assert_relative_eq!(refit.get("m").unwrap(), 2.0, epsilon = 0.05);
}

#[test]
fn test_reads_legacy_document() {
    let text = r#"{"m": [2.0, [0.01, 0.002]], "c": [0.5, [0.002, 0.04]]}"#;
    let stored = read_fit(text.as_bytes()).unwrap();
    assert_eq!(stored.get("c"), Some(0.5));
    assert_eq!(stored.pcov[[1, 0]], 0.002);
    assert_eq!(stored.values[0].0, "m");
}
