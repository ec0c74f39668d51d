//! Fits detached from the session with begin_fit/complete_fit

use actfit::session::{FitSession, SessionState};
use actfit::FitError;
use approx::assert_relative_eq;
use std::thread;

use crate::test_helpers::{noisy_sine_dataset, sine_function};

fn configured() -> FitSession {
    let mut session = FitSession::default();
    session
        .on_data_loaded(noisy_sine_dataset(2.0, 1.0, 0.5, 150, 0.02, 5))
        .unwrap();
    session.on_function_selected(sine_function()).unwrap();
    session
}

#[test]
fn test_fit_on_worker_thread() {
    let mut session = configured();
    let job = session.begin_fit().unwrap();
    assert_eq!(session.state(), SessionState::Fitting);
    // boundary points are left out of the fit
    assert_eq!(job.data().len(), 148);

    let worker = thread::spawn(move || job.run());

    // the session stays responsive but refuses changes while the job runs
    assert!(matches!(
        session.on_parameter_edited("m", 2.0),
        Err(FitError::FitAlreadyRunning)
    ));
    assert!(matches!(
        session.on_range_selected(1.0, 2.0),
        Err(FitError::FitAlreadyRunning)
    ));
    assert!(matches!(session.begin_fit(), Err(FitError::FitAlreadyRunning)));
    assert!(session.current_curve().is_ok());

    let outcome = worker.join().unwrap();
    let result = session.complete_fit(outcome).unwrap();
    assert_eq!(session.state(), SessionState::Converged);
    assert_relative_eq!(result.get("m").unwrap(), 2.0, epsilon = 0.02);
    assert_eq!(
        session.parameters().values(),
        *session.last_result().unwrap().values()
    );
}

#[test]
fn test_cancel_discards_outcome() {
    let mut session = configured();
    let before = session.parameters().clone();
    let job = session.begin_fit().unwrap();
    session.cancel_fit().unwrap();
    assert_eq!(session.state(), SessionState::Configuring);

    let outcome = job.run();
    assert!(matches!(
        session.complete_fit(outcome),
        Err(FitError::InvalidState { .. })
    ));
    assert_eq!(*session.parameters(), before);
    assert_eq!(session.state(), SessionState::Configuring);
}

#[test]
fn test_cancel_requires_running_fit() {
    let mut session = configured();
    assert!(matches!(session.cancel_fit(), Err(FitError::InvalidState { .. })));
}

#[test]
fn test_jobs_can_be_replaced() {
    let mut session = configured();
    let first = session.begin_fit().unwrap();
    session.cancel_fit().unwrap();
    let second = session.begin_fit().unwrap();
    assert_ne!(first.ticket(), second.ticket());

    assert!(session.complete_fit(first.run()).is_err());
    assert_eq!(session.state(), SessionState::Fitting);
    session.complete_fit(second.run()).unwrap();
    assert_eq!(session.state(), SessionState::Converged);
}
