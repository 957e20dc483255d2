use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use compagnon_core::model::SessionError;
use serde::Serialize;
use services::{GateError, SessionServiceError, ThemeServiceError};
use storage::repository::StorageError;
use thiserror::Error;
use tracing::error;

/// Every failure a handler can return, mapped onto an HTTP status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Session(#[from] SessionServiceError),
    #[error(transparent)]
    Theme(#[from] ThemeServiceError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Gate(err) => gate_status(err),
            ApiError::Session(err) => session_service_status(err),
            ApiError::Theme(ThemeServiceError::Theme(_)) => StatusCode::BAD_REQUEST,
            ApiError::Theme(ThemeServiceError::Storage(err)) => storage_status(err),
            ApiError::Theme(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(SessionServiceError::Session(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn gate_status(err: &GateError) -> StatusCode {
    match err {
        GateError::SessionNotFound(_) | GateError::ModuleNotFound(_) => StatusCode::NOT_FOUND,
        GateError::IndexOutOfRange { .. } => StatusCode::BAD_REQUEST,
        GateError::Session(err) => session_status(err),
        GateError::Storage(err) => storage_status(err),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn session_service_status(err: &SessionServiceError) -> StatusCode {
    match err {
        SessionServiceError::NotFound(_) | SessionServiceError::ModuleNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        SessionServiceError::CodeSpaceExhausted => StatusCode::SERVICE_UNAVAILABLE,
        SessionServiceError::Code(_) => StatusCode::BAD_REQUEST,
        SessionServiceError::Session(err) => session_status(err),
        SessionServiceError::Storage(err) => storage_status(err),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::AlreadyEnded(_) => StatusCode::CONFLICT,
        SessionError::UnknownModule { .. } => StatusCode::NOT_FOUND,
        SessionError::NoModules | SessionError::UnknownMode(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound => StatusCode::NOT_FOUND,
        StorageError::Conflict => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
