use thiserror::Error;

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

/// Failure kinds a backend operation can surface.
///
/// Callers see exactly these variants, never a raw transport error type.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Malformed address or incompatible options, detected before any
    /// network I/O. Fatal to construction.
    #[error("invalid backend configuration: {0}")]
    Configuration(String),

    /// The remote directory addressed by the endpoint does not exist or is
    /// not reachable as a directory (HTTP 404/409).
    #[error("remote folder missing at {url}: {message}")]
    FolderMissing { url: String, message: String },

    /// Any other non-2xx status, connection failure, or I/O failure during
    /// a stream copy. `status` is unset for failures below the HTTP layer.
    #[error("transport failure: {message}")]
    Transport { status: Option<u16>, message: String },

    /// The listing response is not a well-formed directory document.
    #[error("malformed directory document: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Transport {
            status: None,
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
