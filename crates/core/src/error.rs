use thiserror::Error;

use crate::model::{ModuleError, SessionCodeError, SessionError, ThemeError, UnknownTemplate};
use crate::presentation::NavigationError;

/// Any domain validation failure, for callers that do not care which one.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    SessionCode(#[from] SessionCodeError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Template(#[from] UnknownTemplate),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
}
