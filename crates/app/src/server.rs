use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use services::AppServices;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes;
use crate::state::AppState;
use crate::ws::{self, PeerRegistry};

/// Build the router with every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/ws", get(ws::ws_handler))
        .route("/api/sessions", post(routes::start_session))
        .route("/api/sessions/{code}", get(routes::get_session))
        .route("/api/sessions/{code}/end", post(routes::end_session))
        .route("/api/sessions/{code}/mode", put(routes::set_mode))
        .route(
            "/api/sessions/{code}/theme",
            get(routes::session_theme).put(routes::set_theme_override),
        )
        .route("/api/sessions/{code}/navigate", post(routes::navigate))
        .route(
            "/api/sessions/{code}/modules/{module_id}/outline",
            get(routes::module_outline),
        )
        .route(
            "/api/sessions/{code}/modules/{module_id}/allowed-index",
            get(routes::allowed_index),
        )
        .route(
            "/api/sessions/{code}/modules/{module_id}/advance",
            post(routes::advance),
        )
        .route(
            "/api/sessions/{code}/modules/{module_id}/force-sync",
            post(routes::force_sync),
        )
        .route("/api/theme", get(routes::get_theme).put(routes::put_theme))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A bound listener plus the relay that feeds its WebSocket peers.
pub struct Server {
    listener: TcpListener,
    state: AppState,
    relay: JoinHandle<()>,
}

impl Server {
    /// Bind `addr` (port 0 picks a free one) and start relaying bus events.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the address cannot be bound.
    pub async fn bind(addr: &str, services: AppServices) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let state = AppState::new(services);
        let relay = ws::spawn_relay(&state.services.bus(), state.peers.clone());
        Ok(Self {
            listener,
            state,
            relay,
        })
    }

    /// # Errors
    ///
    /// Returns the I/O error if the socket address cannot be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[must_use]
    pub fn peers(&self) -> Arc<PeerRegistry> {
        Arc::clone(&self.state.peers)
    }

    /// Serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped the accept loop.
    pub async fn serve<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            state,
            relay,
        } = self;
        let addr = listener.local_addr()?;
        info!(%addr, "server listening");

        let result = axum::serve(listener, build_router(state))
            .with_graceful_shutdown(shutdown)
            .await;
        relay.abort();
        info!("server stopped");
        result
    }
}
