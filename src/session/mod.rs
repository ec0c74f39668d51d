//! The parameter-fit session state machine.
//!
//! A session owns the selected function, the dataset, the fit range and the
//! parameter state, and moves through
//!
//! ```text
//! Idle -> Configuring -> Fitting -> Converged -> Accepted
//!              ^                         |
//!              +------- edit ------------+
//! ```
//!
//! Every operation either commits completely or fails with an error and
//! leaves the session untouched. Committed changes are broadcast to the
//! registered [`SessionObserver`]s.

mod config;
mod events;
mod job;

pub use config::SessionConfig;
pub use events::{ChannelObserver, SessionEvent, SessionObserver};
pub use job::{FitJob, FitOutcome};

use ndarray::Array1;
use std::fmt;
use tracing::{debug, info, warn};

use crate::data::{extent, Dataset, FitRange, RangeFilter};
use crate::engine::{FitEngine, FitResult};
use crate::error::{FitError, Result};
use crate::function::TargetFunction;
use crate::parameters::ParameterState;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No function selected yet
    Idle,
    /// Parameters, bounds and range may be edited
    Configuring,
    /// A fit job is outstanding
    Fitting,
    /// The current values are the result of a successful fit
    Converged,
    /// Terminal; the session no longer changes
    Accepted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Configuring => "Configuring",
            SessionState::Fitting => "Fitting",
            SessionState::Converged => "Converged",
            SessionState::Accepted => "Accepted",
        };
        f.write_str(name)
    }
}

/// What an accepted session hands back.
#[derive(Debug, Clone)]
pub struct AcceptedFit {
    pub function: TargetFunction,
    pub parameters: ParameterState,
    pub result: FitResult,
    pub range: FitRange,
}

/// Plot limits: data and curve extent padded by one unit on each side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

const VIEW_PADDING: f64 = 1.0;

/// One interactive curve-fitting session.
///
/// # Examples
///
/// ```
/// use actfit::session::{FitSession, SessionConfig, SessionState};
/// use actfit::source::SourceEnvironment;
///
/// let mut env = SourceEnvironment::with_seed(0);
/// env.exec("def line(x, a, b) = a * x + b\nxs = linspace(0, 10, 21)\nys = 2 * xs + 1").unwrap();
///
/// let mut session = FitSession::new(SessionConfig::default());
/// session.on_data_loaded(env.dataset("xs", "ys").unwrap()).unwrap();
/// session.on_function_selected(env.function("line").unwrap()).unwrap();
/// session.on_run_fit().unwrap();
/// assert_eq!(session.state(), SessionState::Converged);
///
/// let accepted = session.on_accept().unwrap();
/// assert!((accepted.result.get("a").unwrap() - 2.0).abs() < 1e-6);
/// ```
pub struct FitSession {
    config: SessionConfig,
    engine: FitEngine,
    state: SessionState,
    function: Option<TargetFunction>,
    dataset: Option<Dataset>,
    range: Option<FitRange>,
    parameters: ParameterState,
    last_result: Option<FitResult>,
    pending: Option<u64>,
    next_ticket: u64,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl Default for FitSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl fmt::Debug for FitSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitSession")
            .field("state", &self.state)
            .field("function", &self.function)
            .field("range", &self.range)
            .field("parameters", &self.parameters)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl FitSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            engine: FitEngine::with_config(config.solver.clone()),
            config,
            state: SessionState::Idle,
            function: None,
            dataset: None,
            range: None,
            parameters: ParameterState::new(),
            last_result: None,
            pending: None,
            next_ticket: 0,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn function(&self) -> Option<&TargetFunction> {
        self.function.as_ref()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn range(&self) -> Option<FitRange> {
        self.range
    }

    pub fn parameters(&self) -> &ParameterState {
        &self.parameters
    }

    /// The most recent successful fit, kept across range edits.
    pub fn last_result(&self) -> Option<&FitResult> {
        self.last_result.as_ref()
    }

    /// Register an observer for every subsequent event.
    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: SessionEvent) {
        debug!(?event, "session event");
        for observer in &mut self.observers {
            observer.notify(&event);
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from != to {
            self.state = to;
            info!(%from, %to, "session transition");
            self.emit(SessionEvent::StateChanged { from, to });
        }
    }

    fn reject(&self, operation: &'static str, error: FitError) -> FitError {
        warn!(operation, state = %self.state, %error, "operation rejected");
        error
    }

    /// Fails unless the session is neither fitting nor accepted.
    fn ensure_unlocked(&self, operation: &'static str) -> Result<()> {
        match self.state {
            SessionState::Fitting => Err(self.reject(operation, FitError::FitAlreadyRunning)),
            SessionState::Accepted => Err(self.reject(
                operation,
                FitError::InvalidState {
                    operation,
                    state: self.state.to_string(),
                },
            )),
            _ => Ok(()),
        }
    }

    /// Fails unless parameters may be edited.
    fn ensure_editable(&self, operation: &'static str) -> Result<()> {
        self.ensure_unlocked(operation)?;
        match self.state {
            SessionState::Configuring | SessionState::Converged => Ok(()),
            state => Err(self.reject(
                operation,
                FitError::InvalidState {
                    operation,
                    state: state.to_string(),
                },
            )),
        }
    }

    /// Leave `Converged` after a manual edit.
    fn mark_edited(&mut self) {
        if self.state == SessionState::Converged {
            self.transition(SessionState::Configuring);
        }
    }

    /// Attach a dataset. The fit range resets to the data's x extent.
    pub fn on_data_loaded(&mut self, dataset: Dataset) -> Result<()> {
        self.ensure_unlocked("load data")?;
        let range = FitRange::covering(&dataset).ok_or_else(|| {
            self.reject(
                "load data",
                FitError::MissingInput("dataset has no usable x values".to_string()),
            )
        })?;

        let points = dataset.len();
        self.dataset = Some(dataset);
        self.range = Some(range);
        self.emit(SessionEvent::DataLoaded { points });
        self.emit(SessionEvent::RangeChanged(range));
        self.mark_edited();
        Ok(())
    }

    /// Select the function to fit. Parameters are re-created with the
    /// configured defaults and any previous result is dropped.
    ///
    /// Fails with `InvalidBounds` when the configured default value lies
    /// outside the default bounds.
    pub fn on_function_selected(&mut self, function: TargetFunction) -> Result<()> {
        self.ensure_unlocked("select function")?;
        self.config
            .validate()
            .map_err(|e| self.reject("select function", e.into()))?;
        let parameters = ParameterState::initialize(
            function.parameter_names(),
            self.config.default_value,
            self.config.default_bounds,
        )
        .map_err(|e| self.reject("select function", e))?;

        let event = SessionEvent::FunctionSelected {
            name: function.name().to_string(),
            parameters: function.parameter_names().to_vec(),
        };
        self.function = Some(function);
        self.parameters = parameters;
        self.last_result = None;
        self.emit(event);
        self.transition(SessionState::Configuring);
        Ok(())
    }

    /// Set a parameter by hand. Values outside the parameter's bounds are
    /// rejected with `InvalidBounds`.
    pub fn on_parameter_edited(&mut self, name: &str, value: f64) -> Result<()> {
        self.ensure_editable("edit parameter")?;
        let bounds = self
            .parameters
            .get(name)
            .map(|p| p.bounds())
            .ok_or_else(|| {
                self.reject(
                    "edit parameter",
                    FitError::UnknownParameter(name.to_string()),
                )
            })?;
        bounds
            .check(value)
            .map_err(|e| self.reject("edit parameter", e.into()))?;

        self.parameters.set_value(name, value)?;
        self.emit(SessionEvent::ParameterChanged {
            name: name.to_string(),
            value,
        });
        self.mark_edited();
        Ok(())
    }

    /// Change a parameter's bounds. A value left outside the new bounds is
    /// moved onto the nearest bound.
    pub fn on_bounds_edited(&mut self, name: &str, lower: f64, upper: f64) -> Result<()> {
        self.ensure_editable("edit bounds")?;
        let mut staged = self.parameters.clone();
        staged
            .set_bounds(name, lower, upper)
            .map_err(|e| self.reject("edit bounds", e))?;

        let param = staged
            .get(name)
            .ok_or_else(|| FitError::UnknownParameter(name.to_string()))?;
        let bounds = param.bounds();
        let value = param.value();
        let clamped = bounds.clamp(value);
        if clamped != value {
            staged.set_value(name, clamped)?;
        }

        self.parameters = staged;
        self.emit(SessionEvent::BoundsChanged {
            name: name.to_string(),
            bounds,
        });
        if clamped != value {
            self.emit(SessionEvent::ParameterChanged {
                name: name.to_string(),
                value: clamped,
            });
        }
        self.mark_edited();
        Ok(())
    }

    /// Select the x window used for fitting, swapping reversed ends.
    ///
    /// A window with no data strictly inside fails with `EmptyRange` and
    /// the previous range stays in effect. The last fit result is kept.
    pub fn on_range_selected(&mut self, min: f64, max: f64) -> Result<()> {
        self.ensure_unlocked("select range")?;
        if min.is_nan() || max.is_nan() {
            return Err(self.reject(
                "select range",
                FitError::InvalidBounds("range ends must be numbers".to_string()),
            ));
        }
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            self.reject(
                "select range",
                FitError::MissingInput("no dataset loaded".to_string()),
            )
        })?;

        let range = FitRange::new(min, max).normalized();
        RangeFilter::filter(dataset, range).map_err(|e| self.reject("select range", e))?;

        self.range = Some(range);
        self.emit(SessionEvent::RangeChanged(range));
        self.mark_edited();
        Ok(())
    }

    /// Points inside the current range.
    pub fn filtered_data(&self) -> Result<Dataset> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| FitError::MissingInput("no dataset loaded".to_string()))?;
        let range = match self.range {
            Some(range) => range,
            None => FitRange::covering(dataset)
                .ok_or_else(|| FitError::MissingInput("dataset is empty".to_string()))?,
        };
        RangeFilter::filter(dataset, range)
    }

    /// The function at the current values, evaluated at the filtered xs.
    /// Recomputed on every call.
    pub fn current_curve(&self) -> Result<Array1<f64>> {
        let function = self
            .function
            .as_ref()
            .ok_or_else(|| FitError::MissingInput("no function selected".to_string()))?;
        let filtered = self.filtered_data()?;
        let values = self.parameters.values().to_vec();
        Ok(function.eval_many(filtered.xs(), &values))
    }

    /// Plot limits covering the whole dataset and the current curve.
    pub fn view_bounds(&self) -> Result<ViewBounds> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| FitError::MissingInput("no dataset loaded".to_string()))?;
        let (x_min, x_max) = dataset
            .x_extent()
            .ok_or_else(|| FitError::MissingInput("dataset is empty".to_string()))?;

        let curve = self.current_curve().unwrap_or_else(|_| Array1::zeros(0));
        let ys = dataset.ys().iter().chain(curve.iter()).copied();
        let (y_min, y_max) = extent(ys.filter(|y| y.is_finite())).unwrap_or((0.0, 0.0));

        Ok(ViewBounds {
            x_min: x_min - VIEW_PADDING,
            x_max: x_max + VIEW_PADDING,
            y_min: y_min - VIEW_PADDING,
            y_max: y_max + VIEW_PADDING,
        })
    }

    /// Detach a fit of the current configuration and enter `Fitting`.
    ///
    /// Until the job's outcome is passed to [`FitSession::complete_fit`] or
    /// the job is cancelled, every mutating call fails with
    /// `FitAlreadyRunning`.
    pub fn begin_fit(&mut self) -> Result<FitJob> {
        const OP: &str = "run fit";
        self.ensure_unlocked(OP)?;
        if self.state != SessionState::Configuring {
            return Err(self.reject(
                OP,
                FitError::InvalidState {
                    operation: OP,
                    state: self.state.to_string(),
                },
            ));
        }
        let function = self
            .function
            .clone()
            .ok_or_else(|| self.reject(OP, FitError::MissingInput("no function selected".to_string())))?;
        let data = self.filtered_data().map_err(|e| self.reject(OP, e))?;

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let job = FitJob {
            ticket,
            engine: self.engine.clone(),
            function,
            data,
            initial: self.parameters.values(),
            lower: self.parameters.lower_bounds(),
            upper: self.parameters.upper_bounds(),
        };

        self.pending = Some(ticket);
        self.emit(SessionEvent::FitStarted);
        self.transition(SessionState::Fitting);
        Ok(job)
    }

    /// Apply the outcome of the outstanding job.
    ///
    /// Success moves to `Converged` with the fitted values; failure returns to
    /// `Configuring` with parameters unchanged and hands the error back.
    /// Outcomes of cancelled or superseded jobs are rejected.
    pub fn complete_fit(&mut self, outcome: FitOutcome) -> Result<FitResult> {
        const OP: &str = "complete fit";
        if self.state != SessionState::Fitting || self.pending != Some(outcome.ticket) {
            return Err(self.reject(
                OP,
                FitError::InvalidState {
                    operation: OP,
                    state: self.state.to_string(),
                },
            ));
        }
        self.pending = None;

        let applied = outcome.result.and_then(|result| {
            let mut staged = self.parameters.clone();
            staged.apply_fit_result(&result)?;
            Ok((staged, result))
        });

        match applied {
            Ok((parameters, result)) => {
                self.parameters = parameters;
                self.last_result = Some(result.clone());
                self.emit(SessionEvent::FitSucceeded {
                    cost: result.cost,
                    iterations: result.iterations,
                });
                self.transition(SessionState::Converged);
                Ok(result)
            }
            Err(error) => {
                warn!(%error, "fit failed");
                self.emit(SessionEvent::FitFailed {
                    message: error.to_string(),
                });
                self.transition(SessionState::Configuring);
                Err(error)
            }
        }
    }

    /// Abandon the outstanding job. Parameters stay as they were.
    pub fn cancel_fit(&mut self) -> Result<()> {
        const OP: &str = "cancel fit";
        if self.state != SessionState::Fitting {
            return Err(self.reject(
                OP,
                FitError::InvalidState {
                    operation: OP,
                    state: self.state.to_string(),
                },
            ));
        }
        self.pending = None;
        self.emit(SessionEvent::FitCancelled);
        self.transition(SessionState::Configuring);
        Ok(())
    }

    /// Fit the current configuration, blocking until the solver returns.
    pub fn on_run_fit(&mut self) -> Result<FitResult> {
        let job = self.begin_fit()?;
        let outcome = job.run();
        self.complete_fit(outcome)
    }

    /// Confirm the fit and freeze the session.
    pub fn on_accept(&mut self) -> Result<AcceptedFit> {
        const OP: &str = "accept";
        self.ensure_unlocked(OP)?;
        let (function, result, range) = match (&self.state, &self.function, &self.last_result, self.range) {
            (SessionState::Converged, Some(function), Some(result), Some(range)) => {
                (function.clone(), result.clone(), range)
            }
            _ => {
                return Err(self.reject(
                    OP,
                    FitError::InvalidState {
                        operation: OP,
                        state: self.state.to_string(),
                    },
                ))
            }
        };

        let accepted = AcceptedFit {
            function,
            parameters: self.parameters.clone(),
            result,
            range,
        };
        self.emit(SessionEvent::Accepted);
        self.transition(SessionState::Accepted);
        Ok(accepted)
    }
}
