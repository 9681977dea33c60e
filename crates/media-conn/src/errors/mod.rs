//! Error types for the media-connection facade.

use thiserror::Error;

use rtcsig_roap_core::RoapError;

/// Result type alias for media-connection operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors returned by [`MediaConnection`](crate::MediaConnection)
/// operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    /// The underlying signaling session rejected the request.
    #[error("signaling: {0}")]
    Signaling(#[from] RoapError),
}

impl MediaError {
    /// Coarse grouping for metrics and logs.
    pub fn category(&self) -> &'static str {
        match self {
            MediaError::Signaling(inner) => inner.category(),
        }
    }
}
