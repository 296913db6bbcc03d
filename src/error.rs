use thiserror::Error;

/// Machine-readable reason attached to a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    InvalidBody,
    OutOfRange,
    UnknownWeather,
    UnknownCarType,
    NegativeDistance,
    NonFinite,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::InvalidBody => "invalid_body",
            ValidationCode::OutOfRange => "out_of_range",
            ValidationCode::UnknownWeather => "unknown_weather",
            ValidationCode::UnknownCarType => "unknown_car_type",
            ValidationCode::NegativeDistance => "negative_distance",
            ValidationCode::NonFinite => "non_finite",
        }
    }
}

/// Malformed or out-of-range input. Never reaches model code.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub code: ValidationCode,
    pub field: Option<&'static str>,
    pub message: String,
}

impl ValidationError {
    pub fn new<S: Into<String>>(code: ValidationCode, field: &'static str, message: S) -> Self {
        Self {
            code,
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn body<S: Into<String>>(message: S) -> Self {
        Self {
            code: ValidationCode::InvalidBody,
            field: None,
            message: message.into(),
        }
    }
}

/// Failure of a single regressor, either at load time or for one call.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("malformed tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a single prediction can fail with.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("no regressor produced a usable prediction")]
    ModelUnavailable,
}
