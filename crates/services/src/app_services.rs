use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::bus::EventBus;
use crate::error::AppServicesError;
use crate::navigation_gate::NavigationGate;
use crate::session_service::SessionService;
use crate::theme_cache::ThemeCache;

/// Assembles server-facing services around one event bus.
#[derive(Clone)]
pub struct AppServices {
    bus: Arc<EventBus>,
    gate: Arc<NavigationGate>,
    sessions: Arc<SessionService>,
    theme: Arc<ThemeCache>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or the initial
    /// theme load fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock).await
    }

    /// # Errors
    ///
    /// Returns `AppServicesError` if the initial theme load fails.
    pub async fn from_storage(storage: Storage, clock: Clock) -> Result<Self, AppServicesError> {
        let bus = Arc::new(EventBus::new());
        let gate = Arc::new(NavigationGate::new(
            Arc::clone(&storage.navigation),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.modules),
            bus.clone(),
        ));
        let sessions = Arc::new(SessionService::new(
            clock,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.modules),
            Arc::clone(&storage.navigation),
            bus.clone(),
        ));
        let theme = Arc::new(ThemeCache::load(Arc::clone(&storage.themes)).await?);

        Ok(Self {
            bus,
            gate,
            sessions,
            theme,
        })
    }

    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    #[must_use]
    pub fn gate(&self) -> Arc<NavigationGate> {
        Arc::clone(&self.gate)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn theme(&self) -> Arc<ThemeCache> {
        Arc::clone(&self.theme)
    }
}
