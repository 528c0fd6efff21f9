//! Error types shared across vidmark crates.

use std::path::PathBuf;

/// Top-level error type for vidmark operations.
#[derive(Debug, thiserror::Error)]
pub enum VidmarkError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("A render is already in flight")]
    AlreadyRunning,

    #[error("Engine failure: {message}")]
    EngineFailure { message: String },

    #[error("Render cancelled")]
    Cancelled,

    #[error("Failed to persist rendered output: {message}")]
    PersistFailure { message: String },

    #[error("Cleanup failed: {message}")]
    CleanupFailure { message: String },

    #[error("Resource not found: {handle}")]
    NotFound { handle: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VidmarkError.
pub type VidmarkResult<T> = Result<T, VidmarkError>;

impl VidmarkError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineFailure {
            message: msg.into(),
        }
    }

    pub fn persist(msg: impl Into<String>) -> Self {
        Self::PersistFailure {
            message: msg.into(),
        }
    }

    pub fn cleanup(msg: impl Into<String>) -> Self {
        Self::CleanupFailure {
            message: msg.into(),
        }
    }

    pub fn not_found(handle: impl Into<String>) -> Self {
        Self::NotFound {
            handle: handle.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// `FileNotFound` for a missing path, otherwise the underlying I/O error.
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}
