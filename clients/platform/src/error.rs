//! Error handling for the service clients.

use nimbus_convergence::{AccessError, WaitError};
use thiserror::Error;

/// Client-facing errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("unsupported alarm state {0:?}; expected one of ok, alarm, insufficient_data")]
    UnsupportedAlarmState(String),
}

/// Status accessors report through [`AccessError`] so the engine can tell
/// "gone" apart from everything else.
impl From<ClientError> for AccessError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(_) => AccessError::NotFound,
            other => AccessError::Other(anyhow::Error::new(other)),
        }
    }
}
