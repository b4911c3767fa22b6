//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from browsers.
//! 3. Upgrading each connection to a WebSocket session, but only on the
//!    configured channel path (anything else gets HTTP 404).
//! 4. Registering the session with the relay hub and running two concurrent
//!    halves per session:
//!    - **Reader**: forwards inbound text frames to the hub as `Frame` events.
//!    - **Writer**: drains the session's outbound queue into text frames.
//! 5. Reporting the session's close (or error) to the hub exactly once.
//! 6. Stopping the accept loop and the hub when the `running` flag is cleared.
//!
//! Each session runs in its own Tokio task; only the hub touches membership.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{anyhow, Context};
use chat_core::{ConnectionId, ConnectionIdAllocator};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::WebSocketConfig,
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::RelayEngine;
use crate::domain::{CloseReason, ConnectionState, RelayConfig};
use crate::infrastructure::relay_loop::{RelayEvent, RelayHub, RelayStats};

/// Capacity of the session → hub event queue.
///
/// When full, session readers wait, which pauses reading from their sockets.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// How long a finished session waits for its closing handshake to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound relay, ready to accept connections.
///
/// Split from [`RelayServer::run`] so callers (and tests) can learn the real
/// local address when binding to port 0.
pub struct RelayServer {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    events: mpsc::Sender<RelayEvent>,
    hub: JoinHandle<RelayStats>,
    member_count: watch::Receiver<usize>,
    ids: ConnectionIdAllocator,
}

impl RelayServer {
    /// Validates `config`, binds the listener, and starts the relay hub task.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the listener
    /// cannot be bound (port in use, missing permission).
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid relay configuration")?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

        let engine = RelayEngine::new(config.policy, config.max_message_bytes);
        let (hub, member_count) = RelayHub::new(engine);
        let (events, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let hub = tokio::spawn(hub.run(events_rx));

        Ok(Self {
            listener,
            config: Arc::new(config),
            events,
            hub,
            member_count,
            ids: ConnectionIdAllocator::new(),
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Live member count of the channel.
    pub fn member_count(&self) -> watch::Receiver<usize> {
        self.member_count.clone()
    }

    /// Runs the accept loop until `running` is set to `false`, then shuts the
    /// hub down and returns its final counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub task panicked.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<RelayStats> {
        let RelayServer {
            listener,
            config,
            events,
            hub,
            ids,
            ..
        } = self;

        info!(
            "chat relay listening on ws://{}{}",
            listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            config.channel_path
        );

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    let id = ids.next();
                    debug!(connection = %id, "accepted TCP connection from {peer_addr}");
                    let cfg = Arc::clone(&config);
                    let events = events.clone();
                    tokio::spawn(async move {
                        handle_session(stream, peer_addr, id, cfg, events).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // No connection within the poll window.
                }
            }
        }

        // Process shutdown: the hub removes every member, which ends every
        // session's writer.
        if events.send(RelayEvent::Shutdown).await.is_err() {
            warn!("relay hub already stopped");
        }
        drop(events);

        let stats = hub.await.context("relay hub task failed")?;
        info!(
            accepted = ids.issued(),
            relayed = stats.relayed,
            rejected = stats.rejected,
            "chat relay stopped"
        );
        Ok(stats)
    }
}

/// Binds and runs the relay until `running` is cleared.
///
/// # Errors
///
/// See [`RelayServer::bind`] and [`RelayServer::run`].
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<RelayStats> {
    RelayServer::bind(config).await?.run(running).await
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task; logs the outcome.
async fn handle_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: ConnectionId,
    config: Arc<RelayConfig>,
    events: mpsc::Sender<RelayEvent>,
) {
    match run_session(stream, peer_addr, id, config, events).await {
        Ok(reason) => info!(connection = %id, "session {peer_addr} ended: {reason}"),
        Err(e) => warn!(connection = %id, "session {peer_addr} failed: {e:#}"),
    }
}

/// Runs one connection from upgrade to close.
///
/// # Errors
///
/// Returns an error if the upgrade fails (wrong path, bad handshake) or the
/// relay is already shutting down.  Once the connection is `OPEN`, transport
/// problems are reported as a [`CloseReason`] instead.
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: ConnectionId,
    config: Arc<RelayConfig>,
    events: mpsc::Sender<RelayEvent>,
) -> anyhow::Result<CloseReason> {
    let mut state = ConnectionState::Connecting;

    // tungstenite's own caps stay as the memory guard; `max_message_bytes` is
    // enforced by the relay engine so an oversized frame is only dropped.
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = ws_config
        .max_message_size
        .map(|cap| cap.max(config.max_message_bytes));
    ws_config.max_frame_size = ws_config
        .max_frame_size
        .map(|cap| cap.max(config.max_message_bytes));

    let channel_path = config.channel_path.as_str();
    let check_path = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == channel_path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some(format!("no channel at {}", req.uri().path())));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };

    let ws_stream = match accept_hdr_async_with_config(stream, check_path, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            advance(id, &mut state, ConnectionState::Closed);
            return Err(e).with_context(|| format!("WebSocket handshake failed with {peer_addr}"));
        }
    };

    // ── Admit ─────────────────────────────────────────────────────────────────
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Arc<str>>();
    if events
        .send(RelayEvent::Admitted {
            id,
            sink: outbound_tx,
        })
        .await
        .is_err()
    {
        advance(id, &mut state, ConnectionState::Closed);
        return Err(anyhow!("relay is shutting down"));
    }
    advance(id, &mut state, ConnectionState::Open);
    debug_assert!(state.is_member());

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Writer: outbound queue → socket ──────────────────────────────────────
    let writer = async {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = ws_tx.send(WsMessage::Text(frame.to_string())).await {
                return CloseReason::TransportError(e.to_string());
            }
        }
        // The hub dropped our sink, which only happens on shutdown.
        let _ = ws_tx.send(WsMessage::Close(None)).await;
        CloseReason::Shutdown
    };

    // ── Reader: socket → hub ─────────────────────────────────────────────────
    let reader = async {
        loop {
            let msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return CloseReason::PeerClosed;
                }
                Some(Err(e)) => return CloseReason::TransportError(e.to_string()),
            };

            match msg {
                WsMessage::Text(text) => {
                    debug!(connection = %id, len = text.len(), "frame received");
                    if events.send(RelayEvent::Frame { id, text }).await.is_err() {
                        return CloseReason::Shutdown;
                    }
                }
                WsMessage::Binary(data) => {
                    // The chat protocol is text-only.
                    warn!(connection = %id, len = data.len(), "binary frame ignored");
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {
                    // Control frames are answered by tungstenite itself.
                }
                WsMessage::Close(_) => return CloseReason::PeerClosed,
            }
        }
    };

    let reason = tokio::select! {
        reason = reader => reason,
        reason = writer => reason,
    };

    // Flushes the Close reply tungstenite queued when the peer closed first.
    if let Ok(Err(e)) = timeout(CLOSE_GRACE, ws_tx.close()).await {
        debug!(connection = %id, "closing handshake not completed: {e}");
    }

    advance(id, &mut state, ConnectionState::Closed);
    // Idempotent on the hub side; ignored if the hub is already gone.
    let _ = events
        .send(RelayEvent::Closed {
            id,
            reason: reason.clone(),
        })
        .await;

    Ok(reason)
}

/// Moves a connection to `next`, logging the transition.
fn advance(id: ConnectionId, state: &mut ConnectionState, next: ConnectionState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transition {state} -> {next}"
    );
    debug!(connection = %id, "{state} -> {next}");
    *state = next;
}
