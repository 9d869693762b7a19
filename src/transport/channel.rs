//! Persistent, auto-reconnecting event channel to the dispatch server.
//!
//! [`SocketChannel`] owns one background connection task. Outbound events are
//! queued to that task over an unbounded channel; inbound frames are decoded
//! and handed to the single handler registered for their event name. Handlers
//! run on the connection task and are expected to enqueue work, not do it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::identity::Identity;
use crate::models::events::{AssociateSocket, ASSOCIATE_SOCKET, DRIVER_CONNECTED};
use crate::observability::metrics::Metrics;
use crate::transport::frame::Frame;
use crate::transport::{EventChannel, CONNECT, DISCONNECT};

type Handler = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    /// Fixed delay between reconnect attempts. Attempts are never capped.
    pub reconnect_delay: Duration,
}

struct Shared {
    handlers: DashMap<String, Handler>,
    connected: AtomicBool,
    /// Bumped on every connect and disconnect; only the task started for the
    /// current generation may report link status.
    generation: Mutex<u64>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    metrics: Metrics,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        let mut generation = lock(&self.generation);
        *generation += 1;
        self.store_connected(false);
        *generation
    }

    /// Records link status for `generation`. Returns false, leaving the flag
    /// untouched, when a newer connect or disconnect has superseded it.
    fn set_connected(&self, generation: u64, connected: bool) -> bool {
        let current = lock(&self.generation);
        if *current != generation {
            debug!(generation, current = *current, "ignoring status from retired connection");
            return false;
        }
        self.store_connected(connected);
        true
    }

    fn store_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
        self.metrics.channel_connected.set(i64::from(connected));
    }

    fn dispatch(&self, event: &str, data: Value) {
        // Clone the handler out so the map is not locked while it runs.
        let handler = self
            .handlers
            .get(event)
            .map(|entry| Arc::clone(entry.value()));

        match handler {
            Some(handler) => handler(data),
            None => debug!(event, "no handler registered; dropping event"),
        }
    }

    fn receive(&self, text: &str) {
        match Frame::decode(text) {
            Ok(frame) => self.dispatch(&frame.event, frame.data),
            Err(err) => warn!(error = %err, "ignoring undecodable channel frame"),
        }
    }
}

struct Connection {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

pub struct SocketChannel {
    config: ChannelConfig,
    shared: Arc<Shared>,
    connection: Mutex<Option<Connection>>,
}

impl SocketChannel {
    pub fn new(config: ChannelConfig, metrics: Metrics) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                handlers: DashMap::new(),
                connected: AtomicBool::new(false),
                generation: Mutex::new(0),
                outbound: Mutex::new(None),
                metrics,
            }),
            connection: Mutex::new(None),
        }
    }

    /// Starts the connection task. A no-op while one is already running.
    pub fn connect(&self, identity: &Identity) {
        let mut connection = lock(&self.connection);
        if let Some(existing) = connection.as_ref() {
            if !existing.task.is_finished() {
                debug!("dispatch channel already connected");
                return;
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *lock(&self.shared.outbound) = Some(outbound_tx);

        let generation = self.shared.next_generation();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(
            self.config.clone(),
            generation,
            identity.driver_id,
            Arc::clone(&self.shared),
            outbound_rx,
            shutdown_rx,
        ));

        info!(url = %self.config.url, driver_id = identity.driver_id, "dispatch channel starting");
        *connection = Some(Connection {
            task,
            shutdown: shutdown_tx,
        });
    }

    /// Registers the handler for `event`, replacing any previous one.
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        if self
            .shared
            .handlers
            .insert(event.to_string(), Arc::new(handler))
            .is_some()
        {
            debug!(event, "replaced channel handler");
        }
    }

    pub fn off(&self, event: &str) {
        self.shared.handlers.remove(event);
    }

    /// Feeds a raw inbound frame to the registered handlers.
    #[cfg(test)]
    pub(crate) fn inject(&self, text: &str) {
        self.shared.receive(text);
    }

    /// Stops the connection task. Safe to call any number of times.
    pub fn disconnect(&self) {
        let connection = lock(&self.connection).take();
        lock(&self.shared.outbound).take();

        let was_connected = self.is_connected();
        self.shared.next_generation();

        if let Some(connection) = connection {
            let _ = connection.shutdown.send(true);
            info!("dispatch channel disconnect requested");
        }
        if was_connected {
            self.shared
                .dispatch(DISCONNECT, json!({ "reason": SessionEnd::Shutdown.to_string() }));
        }
    }
}

impl EventChannel for SocketChannel {
    fn emit(&self, event: &str, data: Value) {
        if !self.is_connected() {
            debug!(event, "dispatch channel down; dropping event");
            return;
        }

        let text = match Frame::new(event, data).encode() {
            Ok(text) => text,
            Err(err) => {
                warn!(event, error = %err, "failed to encode channel event");
                return;
            }
        };

        if let Some(outbound) = lock(&self.shared.outbound).as_ref() {
            if outbound.send(text).is_ok() {
                self.shared
                    .metrics
                    .events_emitted_total
                    .with_label_values(&[event])
                    .inc();
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum SessionEnd {
    Shutdown,
    Closed,
    Failed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Shutdown => f.write_str("shutdown"),
            SessionEnd::Closed => f.write_str("closed by server"),
            SessionEnd::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

async fn run_connection(
    config: ChannelConfig,
    generation: u64,
    driver_id: i64,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let attempt = tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => break,
            result = connect_async(config.url.as_str()) => result,
        };

        match attempt {
            Ok((stream, _response)) => {
                let end = serve(
                    stream,
                    generation,
                    driver_id,
                    &shared,
                    &mut outbound_rx,
                    &mut shutdown_rx,
                )
                .await;
                if shared.set_connected(generation, false) {
                    shared.dispatch(DISCONNECT, json!({ "reason": end.to_string() }));
                }

                if matches!(end, SessionEnd::Shutdown) {
                    break;
                }
                warn!(reason = %end, "dispatch channel disconnected");
            }
            Err(err) => {
                warn!(url = %config.url, error = %err, "dispatch channel connect failed");
            }
        }

        shared.metrics.channel_reconnects_total.inc();
        tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => break,
            _ = sleep(config.reconnect_delay) => {}
        }
    }

    shared.set_connected(generation, false);
    info!(generation, "dispatch channel closed");
}

async fn serve(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    generation: u64,
    driver_id: i64,
    shared: &Shared,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();

    // Events emitted while the link was down are not replayed.
    while outbound_rx.try_recv().is_ok() {}

    let socket_id = Uuid::new_v4().to_string();
    let announcements = [
        Frame::new(DRIVER_CONNECTED, json!(driver_id)),
        Frame::new(
            ASSOCIATE_SOCKET,
            json!(AssociateSocket {
                driver_id,
                socket_id: socket_id.clone(),
            }),
        ),
    ];

    for frame in announcements {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(err) => return SessionEnd::Failed(err.to_string()),
        };
        if let Err(err) = sink.send(Message::Text(text)).await {
            return SessionEnd::Failed(err.to_string());
        }
    }

    if !shared.set_connected(generation, true) {
        let _ = sink.send(Message::Close(None)).await;
        return SessionEnd::Shutdown;
    }
    info!(socket_id = %socket_id, "dispatch channel connected");
    shared.dispatch(CONNECT, json!({ "socketId": socket_id }));

    loop {
        tokio::select! {
            _ = shutdown_requested(shutdown_rx) => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            outbound = outbound_rx.recv() => match outbound {
                Some(text) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        return SessionEnd::Failed(err.to_string());
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => shared.receive(&text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => shared.receive(&text),
                    Err(_) => warn!("ignoring non-utf8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                Some(Ok(_)) => {}
                Some(Err(err)) => return SessionEnd::Failed(err.to_string()),
            },
        }
    }
}

async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
