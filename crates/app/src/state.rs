use std::sync::Arc;
use std::time::Instant;

use services::AppServices;

use crate::ws::PeerRegistry;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    /// Open WebSocket peers, keyed by connection id.
    pub peers: Arc<PeerRegistry>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self {
            services,
            peers: Arc::new(PeerRegistry::new()),
            started_at: Instant::now(),
        }
    }
}
