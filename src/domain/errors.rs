//! Domain Errors
//!
//! Every failure the router can report. Caller-input and configuration
//! errors are raised before any I/O; backend errors are passed through
//! unchanged from the Connection port.

use std::error::Error as StdError;

/// Error reported by a Connection implementation.
///
/// Wraps whatever the underlying driver produced (syntax errors,
/// constraint violations, I/O failures) without interpreting it.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl BackendError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping a driver error.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The driver-reported message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by the router, the translator and the pool.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid weight: {0} (weight must be between 1 and 1000000)")]
    InvalidWeight(i64),

    #[error("params must be a map or a list of maps, not {0}")]
    InvalidParameterShape(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("execute_many requires a list of params")]
    MissingBatchParameters,

    #[error("column index {index} out of range for row with {width} columns")]
    ColumnIndexOutOfRange { index: usize, width: usize },

    #[error("No primary connection available")]
    NoPrimaryConnection,

    #[error("No secondary connections available")]
    NoConnectionsAvailable,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RouterError {
    /// True for errors caused by the arguments of a single call.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRole(_)
                | Self::InvalidWeight(_)
                | Self::InvalidParameterShape(_)
                | Self::MissingParameter(_)
                | Self::MissingBatchParameters
                | Self::ColumnIndexOutOfRange { .. }
        )
    }

    /// True for errors caused by how the router was wired up.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::NoPrimaryConnection | Self::NoConnectionsAvailable)
    }
}
