//! Connection manager
//!
//! Owns the one live WebSocket session per active chat. All other components
//! request sends through the [`ConnectionHandle`]; none hold the socket.
//!
//! On open, one init payload is sent carrying the user identity, the chosen
//! mode and a one-shot snapshot of the calendar authorization flag. On close,
//! exactly one reconnect attempt is scheduled after a fixed delay (no
//! backoff). Transport failures are never retried mid-request; they surface
//! as a `Closed` event.

use crate::auth::IntegrationAuth;
use crate::protocol::{InitPayload, Mode};
use crate::{ChatterlyError, Result};
use crossbeam_channel::Sender as EventSender;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, info, warn};

/// Lifecycle events emitted to the app loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Closed,
    /// One raw inbound frame, in arrival order.
    Message(String),
}

enum Command {
    Send(String),
    Shutdown,
}

/// Handle for requesting sends on the live session.
pub struct ConnectionHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send opaque text to the server. Fails silently when no handle is
    /// open; callers must check connectivity first.
    pub fn send_text(&self, text: impl Into<String>) {
        if !self.is_connected() {
            debug!("dropping outbound message, no open connection");
            return;
        }
        if self.command_tx.send(Command::Send(text.into())).is_err() {
            debug!("dropping outbound message, session worker gone");
        }
    }

    /// Stop the session worker and close the transport.
    pub fn shutdown(mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

/// Configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server_url: String,
    pub identity: String,
    pub mode: Mode,
    pub reconnect_delay: Duration,
}

/// Open a session for the given user and mode.
///
/// The calendar authorization snapshot is read from `auth` once, here, and
/// never polled afterwards. Fails if the transport cannot be established on
/// the first attempt.
pub fn open(
    config: SessionConfig,
    auth: &IntegrationAuth,
    events: EventSender<ConnectionEvent>,
) -> Result<ConnectionHandle> {
    let init = InitPayload {
        identity: config.identity.clone(),
        mode: config.mode,
        calendar_authorized: auth.calendar_authorized(&config.identity),
    };

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (first_tx, first_rx) = crossbeam_channel::bounded::<Result<()>>(1);
    let connected = Arc::new(AtomicBool::new(false));

    let worker = {
        let connected = Arc::clone(&connected);
        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = first_tx.send(Err(ChatterlyError::Connection(e.to_string())));
                    return;
                }
            };
            runtime.block_on(run_session(
                config, init, connected, events, command_rx, first_tx,
            ));
        })
    };

    match first_rx.recv() {
        Ok(Ok(())) => Ok(ConnectionHandle {
            command_tx,
            connected,
            worker: Some(worker),
        }),
        Ok(Err(e)) => {
            let _ = worker.join();
            Err(e)
        }
        Err(_) => {
            let _ = worker.join();
            Err(ChatterlyError::Connection("session worker died".to_string()))
        }
    }
}

async fn run_session(
    config: SessionConfig,
    init: InitPayload,
    connected: Arc<AtomicBool>,
    events: EventSender<ConnectionEvent>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    first_tx: crossbeam_channel::Sender<Result<()>>,
) {
    let url = session_url(&config.server_url, &config.identity);
    let init_json = match serde_json::to_string(&init) {
        Ok(json) => json,
        Err(e) => {
            let _ = first_tx.send(Err(ChatterlyError::Connection(e.to_string())));
            return;
        }
    };
    let mut first = Some(first_tx);

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!("session opened: {}", url);
                let (mut sink, mut stream) = ws.split();

                if let Err(e) = sink.send(tungstenite::Message::Text(init_json.clone())).await {
                    warn!("failed to send init payload: {}", e);
                    let _ = events.send(ConnectionEvent::Closed);
                } else {
                    connected.store(true, Ordering::SeqCst);
                    if let Some(tx) = first.take() {
                        let _ = tx.send(Ok(()));
                    }
                    let _ = events.send(ConnectionEvent::Opened);

                    let shutdown =
                        pump(&mut sink, &mut stream, &mut command_rx, &events).await;
                    connected.store(false, Ordering::SeqCst);
                    let _ = events.send(ConnectionEvent::Closed);
                    if shutdown {
                        return;
                    }
                }
            }
            Err(e) => {
                if let Some(tx) = first.take() {
                    let _ = tx.send(Err(ChatterlyError::Connection(e.to_string())));
                    return;
                }
                warn!("reconnect attempt failed: {}", e);
                let _ = events.send(ConnectionEvent::Closed);
            }
        }

        // One attempt per close; fixed delay, no backoff.
        tokio::time::sleep(config.reconnect_delay).await;
        if drain_shutdown(&mut command_rx) {
            return;
        }
        info!("attempting reconnect");
    }
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tungstenite::Message,
>;
type WsStream = futures::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Pump frames until the transport closes. Returns true on shutdown request.
async fn pump(
    sink: &mut WsSink,
    stream: &mut WsStream,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    events: &EventSender<ConnectionEvent>,
) -> bool {
    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(tungstenite::Message::Text(text)).await {
                        warn!("send failed: {}", e);
                        return false;
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = sink.close().await;
                    return true;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    let _ = events.send(ConnectionEvent::Message(text));
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => {
                    debug!("transport closed by peer");
                    return false;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("transport error: {}", e);
                    return false;
                }
            },
        }
    }
}

fn drain_shutdown(command_rx: &mut mpsc::UnboundedReceiver<Command>) -> bool {
    while let Ok(command) = command_rx.try_recv() {
        if matches!(command, Command::Shutdown) {
            return true;
        }
        // Sends queued while disconnected are dropped, not retried.
        debug!("dropping outbound message queued while disconnected");
    }
    false
}

fn session_url(server_url: &str, identity: &str) -> String {
    format!("{}/{}", server_url.trim_end_matches('/'), identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_appends_identity() {
        assert_eq!(
            session_url("ws://localhost:8001/ws/", "u-42"),
            "ws://localhost:8001/ws/u-42"
        );
    }

    #[test]
    fn test_send_while_closed_is_dropped() {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle {
            command_tx,
            connected: Arc::new(AtomicBool::new(false)),
            worker: None,
        };
        handle.send_text("hello");
        assert!(command_rx.try_recv().is_err());
    }

    #[test]
    fn test_open_fails_without_transport() {
        // Nothing listens on this port; open must fail instead of silently
        // deferring to the reconnect loop.
        let (events_tx, _events_rx) = crossbeam_channel::unbounded();
        let result = open(
            SessionConfig {
                server_url: "ws://127.0.0.1:1".to_string(),
                identity: "u-1".to_string(),
                mode: Mode::Text,
                reconnect_delay: Duration::from_millis(10),
            },
            &IntegrationAuth::new(),
            events_tx,
        );
        assert!(result.is_err());
    }
}
