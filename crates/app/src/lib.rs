//! HTTP and WebSocket surface for live presentation sessions.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{Server, build_router};
pub use state::AppState;
