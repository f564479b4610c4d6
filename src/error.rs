use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// A directory listing request that did not produce a listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The requested directory does not exist in the dataset.
    #[error("{path}: not found")]
    NotFound { path: String },

    /// The data source rejected the request.
    #[error("{path}: request failed with status {status}")]
    Status { path: String, status: u16 },

    /// The request never completed.
    #[error("{path}: {reason}")]
    Transport { path: String, reason: String },
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A base or child directory listing failed.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// An operation referenced a node id that is not in the displayed tree.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A dataset manifest could not be decoded.
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The download request could not be written.
    #[error("Export error: {0}")]
    Export(String),
}
