//! In-process fan-out of sync events.
//!
//! Delivery is at-most-once with no ordering guarantee across publishers:
//! a subscriber that falls behind the channel capacity loses the oldest
//! events and keeps going.

use std::sync::atomic::{AtomicU64, Ordering};

use compagnon_core::model::{SessionCode, SyncEvent};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

/// An event scoped to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionCode,
    pub event: SyncEvent,
}

/// Publishing side of the broadcast transport.
pub trait EventPublisher: Send + Sync {
    /// Emit to every connected subscriber. Returns how many receivers were
    /// reached; zero is not an error.
    fn publish(&self, session: &SessionCode, event: SyncEvent) -> usize;
}

pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    published: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }

    /// Receive every event for every session published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Receive events for one session only.
    #[must_use]
    pub fn subscribe_session(&self, session: SessionCode) -> SessionSubscription {
        SessionSubscription {
            session,
            rx: self.tx.subscribe(),
        }
    }

    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, session: &SessionCode, event: SyncEvent) -> usize {
        let _ = self.published.fetch_add(1, Ordering::Relaxed);
        let name = event.name();
        let reached = self
            .tx
            .send(SessionEvent {
                session: session.clone(),
                event,
            })
            .unwrap_or(0);
        debug!(session = %session, event = name, reached, "published sync event");
        reached
    }
}

/// Receiver filtered to a single session code.
pub struct SessionSubscription {
    session: SessionCode,
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Next event for this session, or `None` once the bus is gone.
    ///
    /// Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.session == self.session => return Some(envelope.event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(session = %self.session, skipped, "subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
