//! Shared error types for the services crate.

use thiserror::Error;

use compagnon_core::model::{ModuleId, SessionCode, SessionCodeError, SessionError, ThemeError};
use compagnon_core::presentation::NavigationError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `NavigationGate`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GateError {
    #[error("session {0} not found")]
    SessionNotFound(SessionCode),
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),
    #[error("submodule index {index} out of range for {len} slides")]
    IndexOutOfRange { index: u32, len: usize },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionServiceError {
    #[error("session {0} not found")]
    NotFound(SessionCode),
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),
    #[error("could not allocate a free session code")]
    CodeSpaceExhausted,
    #[error(transparent)]
    Code(#[from] SessionCodeError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ThemeCache`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ThemeServiceError {
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from a `NavigationBackend`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Errors returned to callers of a `PresentationController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("presentation controller has stopped")]
    Stopped,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Theme(#[from] ThemeServiceError),
}
