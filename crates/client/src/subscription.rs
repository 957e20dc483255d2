//! Session WebSocket subscription with reconnect.
//!
//! Frames that arrive while disconnected are lost; the controller's poll
//! covers the gap.

use std::time::Duration;

use compagnon_core::model::{SessionCode, SyncEvent};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

/// `ws(s)://<server>/ws?session=<code>` for an `http(s)` server URL.
///
/// # Errors
///
/// Returns `ClientError::UnsupportedScheme` for anything but `http` and
/// `https`.
pub fn ws_url(server: &Url, code: &SessionCode) -> Result<Url, ClientError> {
    let scheme = match server.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    };
    let mut url = server.join("ws")?;
    url.set_scheme(scheme)
        .map_err(|()| ClientError::UnsupportedScheme(scheme.to_string()))?;
    url.query_pairs_mut()
        .clear()
        .append_pair("session", code.as_str());
    Ok(url)
}

/// Keep a WebSocket open to `url` and forward decoded events.
///
/// The task reconnects with exponential backoff and stops when the
/// receiver is dropped, after `session-ended`, or when the server refuses
/// the session.
#[must_use]
pub fn subscribe(url: Url, policy: ReconnectPolicy) -> mpsc::Receiver<SyncEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(run(url, policy, tx));
    rx
}

enum Disconnect {
    Retry,
    Stop,
}

async fn run(url: Url, policy: ReconnectPolicy, tx: mpsc::Sender<SyncEvent>) {
    let mut delay = policy.initial_delay;
    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                info!(%url, "subscribed");
                delay = policy.initial_delay;
                if let Disconnect::Stop = forward(socket, &tx).await {
                    break;
                }
                warn!(%url, "subscription dropped");
            }
            Err(WsError::Http(response)) if response.status().is_client_error() => {
                warn!(%url, status = response.status().as_u16(), "server refused subscription");
                break;
            }
            Err(err) => {
                warn!(%url, error = %err, "subscription connect failed");
            }
        }

        tokio::select! {
            () = tx.closed() => break,
            () = tokio::time::sleep(delay) => {}
        }
        delay = policy.next_delay(delay);
    }
    debug!(%url, "subscription task stopped");
}

async fn forward<S>(mut socket: S, tx: &mpsc::Sender<SyncEvent>) -> Disconnect
where
    S: futures::Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let message = tokio::select! {
            () = tx.closed() => return Disconnect::Stop,
            message = socket.next() => message,
        };
        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return Disconnect::Retry,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                debug!(error = %err, "websocket read failed");
                return Disconnect::Retry;
            }
        };
        let event: SyncEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "ignoring malformed frame");
                continue;
            }
        };
        let ended = event == SyncEvent::SessionEnded;
        if tx.send(event).await.is_err() || ended {
            return Disconnect::Stop;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> SessionCode {
        SessionCode::new("QRST45").unwrap()
    }

    #[test]
    fn ws_url_switches_scheme_and_keeps_prefix() {
        let server = Url::parse("https://example.com/compagnon/").unwrap();
        let url = ws_url(&server, &code()).unwrap();
        assert_eq!(url.as_str(), "wss://example.com/compagnon/ws?session=QRST45");

        let local = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            ws_url(&local, &code()).unwrap().as_str(),
            "ws://127.0.0.1:8080/ws?session=QRST45"
        );
    }

    #[test]
    fn ws_url_rejects_other_schemes() {
        let server = Url::parse("file:///tmp/x").unwrap();
        assert!(matches!(
            ws_url(&server, &code()),
            Err(ClientError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(policy.next_delay(Duration::from_secs(4)), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn forward_stops_after_session_ended() {
        let frames = vec![
            Ok(Message::Text("not json".into())),
            Ok(Message::Text(
                serde_json::to_string(&SyncEvent::SessionEnded).unwrap().into(),
            )),
            Ok(Message::Text("never read".into())),
        ];
        let (tx, mut rx) = mpsc::channel(4);
        let outcome = forward(futures::stream::iter(frames), &tx).await;
        assert!(matches!(outcome, Disconnect::Stop));
        assert_eq!(rx.recv().await, Some(SyncEvent::SessionEnded));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn forward_retries_when_the_stream_ends() {
        let frames: Vec<Result<Message, WsError>> = vec![Ok(Message::Pong(Vec::new().into()))];
        let (tx, _rx) = mpsc::channel(4);
        let outcome = forward(futures::stream::iter(frames), &tx).await;
        assert!(matches!(outcome, Disconnect::Retry));
    }
}
