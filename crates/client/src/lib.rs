//! Headless presentation client: talks to the server over HTTP, listens on
//! the session WebSocket and drives a `PresentationController`.

#![forbid(unsafe_code)]

pub mod error;
pub mod http;
pub mod subscription;
pub mod vm;

pub use error::ClientError;
pub use http::{HttpBackend, SessionInfo};
pub use subscription::{ReconnectPolicy, subscribe, ws_url};
pub use vm::{Interaction, SlideVm, map_slide};
