//! Integration tests for the session state machine

use actfit::data::FitRange;
use actfit::session::{ChannelObserver, FitSession, SessionConfig, SessionEvent, SessionState};
use actfit::source::{SourceEnvironment, DEMO_SOURCE};
use actfit::{Bounds, FitError};
use approx::assert_relative_eq;
use ndarray::array;

use crate::test_helpers::{
    line_function, negative_intercept_dataset, sine_dataset, sine_function, slope_through_origin,
};

fn configured() -> FitSession {
    let mut session = FitSession::default();
    session.on_data_loaded(sine_dataset(2.0, 1.0, 0.5, 100)).unwrap();
    session.on_function_selected(sine_function()).unwrap();
    session
}

fn converged() -> FitSession {
    let mut session = configured();
    session.on_run_fit().unwrap();
    assert_eq!(session.state(), SessionState::Converged);
    session
}

#[test]
fn test_starts_idle() {
    let session = FitSession::default();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.parameters().is_empty());
    assert!(session.last_result().is_none());
}

#[test]
fn test_full_lifecycle() {
    let mut session = configured();
    assert_eq!(session.state(), SessionState::Configuring);

    let result = session.on_run_fit().unwrap();
    assert_eq!(session.state(), SessionState::Converged);
    assert_relative_eq!(result.get("m").unwrap(), 2.0, epsilon = 1e-3);
    assert_relative_eq!(session.parameters().get("b").unwrap().value(), 1.0, epsilon = 1e-3);

    let accepted = session.on_accept().unwrap();
    assert_eq!(session.state(), SessionState::Accepted);
    assert_eq!(accepted.function.name(), "f");
    assert_eq!(accepted.parameters, *session.parameters());
    assert_eq!(accepted.result, result);
    assert_eq!(accepted.range, session.range().unwrap());
}

#[test]
fn test_fit_keeps_bounds() {
    let mut session = configured();
    session.on_bounds_edited("c", -1.0, 1.0).unwrap();
    session.on_run_fit().unwrap();

    let c = session.parameters().get("c").unwrap();
    assert_eq!(c.bounds(), Bounds { min: -1.0, max: 1.0 });
    assert_relative_eq!(c.value(), 0.5, epsilon = 1e-3);
    assert_eq!(session.parameters().get("m").unwrap().bounds(), Bounds { min: 0.0, max: 10.0 });
}

#[test]
fn test_default_bounds_hold_negative_intercept_at_zero() {
    let mut session = FitSession::default();
    session.on_data_loaded(negative_intercept_dataset()).unwrap();
    session.on_function_selected(line_function()).unwrap();

    session.on_run_fit().unwrap();
    assert_eq!(session.state(), SessionState::Converged);

    // The default range drops the two end points
    let slope = slope_through_origin(&session.filtered_data().unwrap());
    assert_relative_eq!(session.parameters().get("a").unwrap().value(), slope, epsilon = 1e-6);
    let b = session.parameters().get("b").unwrap().value();
    assert!(b >= 0.0 && b < 1e-6, "b = {}", b);
}

#[test]
fn test_edit_after_convergence_returns_to_configuring() {
    let mut session = converged();
    session.on_parameter_edited("m", 3.0).unwrap();
    assert_eq!(session.state(), SessionState::Configuring);
    assert_eq!(session.parameters().get("m").unwrap().value(), 3.0);
    // the previous result stays available for display
    assert!(session.last_result().is_some());
}

#[test]
fn test_run_fit_requires_configuring() {
    let mut idle = FitSession::default();
    assert!(matches!(idle.on_run_fit(), Err(FitError::InvalidState { .. })));
    assert_eq!(idle.state(), SessionState::Idle);

    let mut session = converged();
    let before = session.parameters().clone();
    assert!(matches!(session.on_run_fit(), Err(FitError::InvalidState { .. })));
    assert_eq!(session.state(), SessionState::Converged);
    assert_eq!(*session.parameters(), before);
}

#[test]
fn test_accept_requires_converged() {
    let mut session = configured();
    assert!(matches!(session.on_accept(), Err(FitError::InvalidState { .. })));
    assert_eq!(session.state(), SessionState::Configuring);
}

#[test]
fn test_accepted_session_is_frozen() {
    let mut session = converged();
    session.on_accept().unwrap();
    let parameters = session.parameters().clone();
    let range = session.range();

    assert!(matches!(
        session.on_parameter_edited("m", 1.0),
        Err(FitError::InvalidState { .. })
    ));
    assert!(matches!(session.on_run_fit(), Err(FitError::InvalidState { .. })));
    assert!(matches!(
        session.on_range_selected(1.0, 2.0),
        Err(FitError::InvalidState { .. })
    ));
    assert!(session.on_bounds_edited("m", 0.0, 1.0).is_err());
    assert!(session.on_function_selected(sine_function()).is_err());
    assert!(session.on_data_loaded(sine_dataset(1.0, 1.0, 0.0, 10)).is_err());
    assert!(session.on_accept().is_err());

    assert_eq!(session.state(), SessionState::Accepted);
    assert_eq!(*session.parameters(), parameters);
    assert_eq!(session.range(), range);
}

#[test]
fn test_function_selection_resets_parameters() {
    let mut session = converged();
    let env = {
        let mut env = SourceEnvironment::with_seed(0);
        env.exec("def line(x, slope, offset) = slope * x + offset").unwrap();
        env
    };
    session.on_function_selected(env.function("line").unwrap()).unwrap();

    assert_eq!(session.state(), SessionState::Configuring);
    assert_eq!(session.parameters().names(), vec!["slope", "offset"]);
    assert_eq!(session.parameters().values(), array![1.0, 1.0]);
    assert!(session.last_result().is_none());
}

#[test]
fn test_default_value_outside_default_bounds_is_refused() {
    let config = SessionConfig {
        default_value: 50.0,
        ..SessionConfig::default()
    };
    let mut session = FitSession::new(config);
    let err = session.on_function_selected(sine_function()).unwrap_err();
    assert!(matches!(err, FitError::InvalidBounds(_)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.function().is_none());
}

#[test]
fn test_configured_defaults() {
    let config = SessionConfig {
        default_value: 0.5,
        default_bounds: Bounds { min: -2.0, max: 2.0 },
        ..SessionConfig::default()
    };
    let mut session = FitSession::new(config);
    session.on_function_selected(sine_function()).unwrap();
    for param in session.parameters().iter() {
        assert_eq!(param.value(), 0.5);
        assert_eq!(param.bounds(), Bounds { min: -2.0, max: 2.0 });
    }
}

#[test]
fn test_manual_edits_are_validated() {
    let mut session = configured();
    assert!(matches!(
        session.on_parameter_edited("m", -0.5),
        Err(FitError::InvalidBounds(_))
    ));
    assert!(matches!(
        session.on_parameter_edited("q", 1.0),
        Err(FitError::UnknownParameter(_))
    ));
    assert!(matches!(
        session.on_bounds_edited("m", 3.0, 3.0),
        Err(FitError::InvalidBounds(_))
    ));
    assert_eq!(session.parameters().values(), array![1.0, 1.0, 1.0]);
}

#[test]
fn test_range_selection() {
    let mut session = configured();
    let full = session.range().unwrap();
    assert_relative_eq!(full.max, 2.0 * std::f64::consts::PI);

    // reversed ends are swapped
    session.on_range_selected(4.0, 1.0).unwrap();
    assert_eq!(session.range(), Some(FitRange::new(1.0, 4.0)));
    let filtered = session.filtered_data().unwrap();
    assert!(filtered.xs().iter().all(|&x| x > 1.0 && x < 4.0));
    assert_eq!(session.current_curve().unwrap().len(), filtered.len());

    // a window without data is rejected and the old one kept
    assert!(matches!(
        session.on_range_selected(20.0, 30.0),
        Err(FitError::EmptyRange { .. })
    ));
    assert!(matches!(
        session.on_range_selected(2.0, 2.0),
        Err(FitError::EmptyRange { .. })
    ));
    assert!(matches!(
        session.on_range_selected(f64::NAN, 2.0),
        Err(FitError::InvalidBounds(_))
    ));
    assert_eq!(session.range(), Some(FitRange::new(1.0, 4.0)));
}

#[test]
fn test_range_change_keeps_result_but_needs_refit() {
    let mut session = converged();
    let values = session.parameters().values();
    session.on_range_selected(0.5, 5.0).unwrap();
    assert_eq!(session.state(), SessionState::Configuring);
    assert_eq!(session.parameters().values(), values);
    assert!(session.last_result().is_some());

    let refit = session.on_run_fit().unwrap();
    assert!(refit.n_points < 100);
}

#[test]
fn test_range_requires_data() {
    let mut session = FitSession::default();
    session.on_function_selected(sine_function()).unwrap();
    assert!(matches!(
        session.on_range_selected(0.0, 1.0),
        Err(FitError::MissingInput(_))
    ));
    assert!(matches!(session.on_run_fit(), Err(FitError::MissingInput(_))));
    assert_eq!(session.state(), SessionState::Configuring);
}

#[test]
fn test_new_data_resets_range() {
    let mut session = converged();
    session.on_range_selected(1.0, 2.0).unwrap();
    session.on_data_loaded(sine_dataset(1.0, 1.0, 0.0, 20)).unwrap();
    assert_eq!(session.state(), SessionState::Configuring);
    assert_relative_eq!(session.range().unwrap().min, 0.0);
    assert_eq!(session.dataset().unwrap().len(), 20);

    let empty = actfit::Dataset::from_vecs(vec![], vec![]).unwrap();
    assert!(matches!(session.on_data_loaded(empty), Err(FitError::MissingInput(_))));
    assert_eq!(session.dataset().unwrap().len(), 20);
}

#[test]
fn test_failed_fit_leaves_parameters() {
    let mut env = SourceEnvironment::with_seed(0);
    env.exec("def f(x, k) = log(k - 5) * x\nxs = linspace(1, 5, 20)\nys = 2 * xs")
        .unwrap();
    let mut session = FitSession::default();
    session.on_data_loaded(env.dataset("xs", "ys").unwrap()).unwrap();
    session.on_function_selected(env.function("f").unwrap()).unwrap();

    let before = session.parameters().clone();
    assert!(matches!(session.on_run_fit(), Err(FitError::Convergence(_))));
    assert_eq!(session.state(), SessionState::Configuring);
    assert_eq!(*session.parameters(), before);
}

#[test]
fn test_view_bounds_cover_data_and_curve() {
    let session = configured();
    let view = session.view_bounds().unwrap();
    assert_relative_eq!(view.x_min, -1.0);
    assert_relative_eq!(view.x_max, 2.0 * std::f64::consts::PI + 1.0);
    // the starting curve lies within the data, so the data sets the y limits
    let (y_lo, y_hi) = session.dataset().unwrap().y_extent().unwrap();
    assert_eq!(view.y_min, y_lo - 1.0);
    assert_eq!(view.y_max, y_hi + 1.0);
}

#[test]
fn test_events_are_broadcast_in_order() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut env = SourceEnvironment::with_seed(1);
    env.exec(DEMO_SOURCE).unwrap();

    let data = env.dataset("xs", "data").unwrap();
    let full = FitRange::covering(&data).unwrap();

    let mut session = FitSession::default();
    session.subscribe(ChannelObserver(tx));
    session.on_data_loaded(data).unwrap();
    session.on_function_selected(env.function("f").unwrap()).unwrap();
    session.on_parameter_edited("m", 2.0).unwrap();
    session.on_bounds_edited("b", 2.0, 5.0).unwrap();
    // a rejected edit is not broadcast
    assert!(session.on_parameter_edited("m", 50.0).is_err());

    let events: Vec<SessionEvent> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            SessionEvent::DataLoaded { points: 100 },
            SessionEvent::RangeChanged(full),
            SessionEvent::FunctionSelected {
                name: "f".to_string(),
                parameters: vec!["m".to_string(), "b".to_string(), "c".to_string()],
            },
            SessionEvent::StateChanged {
                from: SessionState::Idle,
                to: SessionState::Configuring,
            },
            SessionEvent::ParameterChanged {
                name: "m".to_string(),
                value: 2.0,
            },
            SessionEvent::BoundsChanged {
                name: "b".to_string(),
                bounds: Bounds { min: 2.0, max: 5.0 },
            },
            SessionEvent::ParameterChanged {
                name: "b".to_string(),
                value: 2.0,
            },
        ]
    );
}
