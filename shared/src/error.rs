//! Errors raised by the forecasting and reporting core

use thiserror::Error;

/// Contract violations detected by the pure computations in this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Empty series, malformed rows, out-of-range parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough snapshots to compute a diff or report
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidInput(message.into())
    }

    pub fn insufficient(message: impl Into<String>) -> Self {
        CoreError::InsufficientData(message.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
