//! WebSocket fan-out: one relay task reads the event bus and pushes each
//! event to the peers joined to that session.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use compagnon_core::model::{SessionCode, SessionError, SyncEvent};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use services::EventBus;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PEER_BUFFER: usize = 64;

/// One connected WebSocket client.
pub struct Peer {
    pub id: String,
    pub session: SessionCode,
    tx: mpsc::Sender<Arc<str>>,
    dropped: AtomicU64,
}

impl Peer {
    #[must_use]
    pub fn new(session: SessionCode, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session,
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a frame without waiting. A full or closed queue drops it.
    pub fn send(&self, frame: Arc<str>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<String, Arc<Peer>>>,
}

impl PeerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, peer: Arc<Peer>) {
        let mut peers = self.peers.write().await;
        let _ = peers.insert(peer.id.clone(), peer);
    }

    pub async fn remove(&self, id: &str) {
        let mut peers = self.peers.write().await;
        let _ = peers.remove(id);
    }

    pub async fn count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Push one event to every peer of `session`; returns how many peers
    /// accepted the frame.
    pub async fn broadcast_to_session(&self, session: &SessionCode, event: &SyncEvent) -> usize {
        let frame: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(err) => {
                warn!(event = event.name(), error = %err, "failed to serialize event");
                return 0;
            }
        };
        let peers = self.peers.read().await;
        let mut delivered = 0;
        for peer in peers.values().filter(|peer| peer.session == *session) {
            if peer.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                warn!(peer = %peer.id, session = %session, dropped = peer.dropped_count(), "peer queue full, event dropped");
            }
        }
        debug!(session = %session, event = event.name(), delivered, "relayed event");
        delivered
    }
}

/// Forward every bus event to the WebSocket peers of its session until
/// the bus closes.
#[must_use]
pub fn spawn_relay(bus: &EventBus, peers: Arc<PeerRegistry>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    peers
                        .broadcast_to_session(&envelope.session, &envelope.event)
                        .await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "relay lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("event relay stopped");
    })
}

#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    pub session: SessionCode,
}

/// GET /ws?session={code}
///
/// Only active sessions can be joined.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<JoinQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let session = state.services.sessions().get(&query.session).await?;
    if !session.is_active() {
        return Err(SessionError::AlreadyEnded(query.session).into());
    }
    let peers = Arc::clone(&state.peers);
    Ok(ws.on_upgrade(move |socket| run_peer(socket, query.session, peers)))
}

async fn run_peer(socket: WebSocket, session: SessionCode, peers: Arc<PeerRegistry>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(PEER_BUFFER);
    let peer = Arc::new(Peer::new(session, tx));
    let id = peer.id.clone();
    peers.add(Arc::clone(&peer)).await;
    info!(peer = %id, session = %peer.session, "peer joined");

    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        let _ = ping.tick().await;
        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if sink.send(Message::Text(text.as_ref().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Peers only listen; inbound frames are drained until close.
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Close(_) => break,
            Message::Text(text) => debug!(peer = %id, len = text.len(), "ignoring inbound text"),
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    outbound.abort();
    peers.remove(&id).await;
    info!(peer = %id, session = %peer.session, "peer left");
}
