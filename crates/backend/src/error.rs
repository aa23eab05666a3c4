//! Backend call failures.

use gphyx_common::error::GphyxError;

/// Why a backend call failed.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend transport failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Backend request timed out")]
    Timeout,

    #[error("Backend returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Backend protocol error: {0}")]
    Protocol(String),

    /// The service answered but reported the operation as failed.
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    #[error("Frame codec error: {0}")]
    Image(#[from] image::ImageError),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Transport(e)
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<BackendError> for GphyxError {
    fn from(e: BackendError) -> Self {
        GphyxError::backend(e.to_string())
    }
}
