//! Error types for roap-core
//!
//! Local, typed failures of the public API. Protocol errors arriving
//! from the peer are data, not `Err` values: they drive the state
//! machine and surface through [`RoapEvent::Failure`] when fatal.
//!
//! [`RoapEvent::Failure`]: crate::events::RoapEvent

use thiserror::Error;

/// Result type alias for roap-core operations.
pub type RoapResult<T> = Result<T, RoapError>;

/// Errors returned by the session's public operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoapError {
    /// The session was closed; no further inputs are accepted.
    #[error("session is closed")]
    SessionClosed,

    /// The engine is parked in a terminal error state and can never
    /// accept the request.
    #[error("session is in a terminal error state")]
    SessionFailed,

    /// An inbound message was missing a field its type requires.
    #[error("invalid ROAP message: missing required field '{field}'")]
    InvalidMessage { field: String },
}

impl RoapError {
    /// Coarse grouping for metrics and logs.
    pub fn category(&self) -> &'static str {
        match self {
            RoapError::SessionClosed | RoapError::SessionFailed => "lifecycle",
            RoapError::InvalidMessage { .. } => "validation",
        }
    }
}
