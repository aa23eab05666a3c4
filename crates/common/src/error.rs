//! Error types shared across gPHYX crates.

use std::path::PathBuf;

/// Top-level error type for gPHYX operations.
#[derive(Debug, thiserror::Error)]
pub enum GphyxError {
    /// A path edit was refused (bad index, degenerate geometry, node limit).
    #[error("Geometry error: {message}")]
    Geometry { message: String },

    #[error("Tracking error: {message}")]
    Tracking { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GphyxError.
pub type GphyxResult<T> = Result<T, GphyxError>;

impl GphyxError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry {
            message: msg.into(),
        }
    }

    pub fn tracking(msg: impl Into<String>) -> Self {
        Self::Tracking {
            message: msg.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
