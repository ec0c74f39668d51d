use thiserror::Error;

/// Error types for the actfit library.
///
/// Every variant is recoverable at the session level: an operation that fails
/// commits nothing, and the error is handed back to the caller for display.
#[derive(Error, Debug)]
pub enum FitError {
    /// The function exposes no usable parameter metadata.
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// A parameter name that the current function does not declare.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Lower bound not strictly below upper bound, or a value outside its bounds.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// The fit range excludes every data point.
    #[error("Empty fit range: ({min}, {max}) contains no data points")]
    EmptyRange { min: f64, max: f64 },

    /// Initial guess, bounds and parameter count disagree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The solver failed to reduce the residual within its budget.
    #[error("Fit failed to converge: {0}")]
    Convergence(String),

    /// A fit job is already outstanding for this session.
    #[error("A fit is already running")]
    FitAlreadyRunning,

    /// The operation is not valid in the session's current state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// A function or dataset the operation needs has not been provided.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Failure while parsing or evaluating source text.
    #[error("Source error: {0}")]
    Source(#[from] crate::source::SourceError),

    /// A fit artifact could not be produced or restored.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<crate::parameters::BoundsError> for FitError {
    fn from(err: crate::parameters::BoundsError) -> Self {
        FitError::InvalidBounds(err.to_string())
    }
}

/// Result type alias for actfit operations.
pub type Result<T> = std::result::Result<T, FitError>;
