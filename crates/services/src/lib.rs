#![forbid(unsafe_code)]

pub mod app_services;
pub mod bus;
pub mod error;
pub mod navigation_gate;
pub mod presentation;
pub mod session_service;
pub mod theme_cache;

pub use compagnon_core::Clock;

pub use app_services::AppServices;
pub use bus::{EventBus, EventPublisher, SessionEvent, SessionSubscription};
pub use error::{
    AppServicesError, BackendError, ControllerError, GateError, SessionServiceError,
    ThemeServiceError,
};
pub use navigation_gate::{AdvanceOutcome, NavigateRequest, NavigationGate, classify};
pub use presentation::{
    ControllerConfig, NavigationBackend, PresentationController, ViewSnapshot, events_from_bus,
};
pub use session_service::{ModuleOutline, SessionService};
pub use theme_cache::ThemeCache;
