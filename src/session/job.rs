use ndarray::Array1;

use crate::data::Dataset;
use crate::engine::{FitEngine, FitResult};
use crate::error::Result;
use crate::function::TargetFunction;

/// A fit detached from its session so it can run on a worker thread.
///
/// Everything the solver needs is copied in when the job is created; running
/// it touches no session state. Hand the [`FitOutcome`] back with
/// [`FitSession::complete_fit`](super::FitSession::complete_fit).
#[derive(Debug, Clone)]
pub struct FitJob {
    pub(super) ticket: u64,
    pub(super) engine: FitEngine,
    pub(super) function: TargetFunction,
    pub(super) data: Dataset,
    pub(super) initial: Array1<f64>,
    pub(super) lower: Array1<f64>,
    pub(super) upper: Array1<f64>,
}

/// The result of a [`FitJob`], tagged with the job it came from.
#[derive(Debug)]
pub struct FitOutcome {
    pub ticket: u64,
    pub result: Result<FitResult>,
}

impl FitJob {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Points the fit will use.
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn run(self) -> FitOutcome {
        let result = self.engine.fit(
            &self.function,
            &self.data,
            &self.initial,
            &self.lower,
            &self.upper,
        );
        FitOutcome {
            ticket: self.ticket,
            result,
        }
    }
}
