//! Actor that owns one mounted [`ClientNavigationView`] and keeps it in
//! sync with broadcasts and the authoritative store.
//!
//! [`ClientNavigationView`]: compagnon_core::presentation::ClientNavigationView

mod backend;
mod controller;

pub use backend::NavigationBackend;
pub use controller::{
    ControllerConfig, DEFAULT_POLL_INTERVAL, PresentationController, ViewSnapshot,
    events_from_bus,
};
