use compagnon_core::presentation::NavigationError;
use services::{BackendError, ControllerError};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status, message } => BackendError::Rejected { status, message },
            other => BackendError::Transport(other.to_string()),
        }
    }
}
