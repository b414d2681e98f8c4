//! Error types for the anofox-charging library.

use thiserror::Error;

/// Result type alias for charging-session operations.
pub type Result<T> = std::result::Result<T, ChargingError>;

/// Errors that can occur while detecting changepoints or sessions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChargingError {
    /// The input table has no usable datetime axis.
    #[error("input shape error: {0}")]
    InputShape(String),

    /// Unknown changepoint detection method.
    #[error("unknown method: {0} (choose from 'pelt', 'binseg', 'window', 'bottomup')")]
    UnsupportedMethod(String),

    /// Unknown segment cost model.
    #[error("unknown cost model: {0} (choose from 'l1', 'l2')")]
    UnsupportedModel(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between columns.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A required column is absent from the table.
    #[error("missing column: {0}")]
    MissingColumn(String),
}
