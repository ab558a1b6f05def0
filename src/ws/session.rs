//! Transport session: one push connection with a fixed-delay reconnect loop.
//!
//! The lifecycle is an explicit state machine ([`ConnectionState::on_event`])
//! driven by a single background task. Consumers observe transitions through
//! a `watch` channel and send frames through a [`SessionHandle`].

use crate::error::{AppError, Result};
use crate::ws::connection::{Connection, Connector};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Delay between a lost connection and the next attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Owner asked for the session to start
    Open,
    /// Handshake completed
    TransportOpened,
    /// Socket closed, errored, or the attempt failed
    TransportClosed,
    /// Retry delay expired
    RetryElapsed,
    /// Owner tore the session down
    Teardown,
}

impl ConnectionState {
    /// Next state for `event`, or `None` if the event is not valid here
    pub fn on_event(self, event: SessionEvent) -> Option<ConnectionState> {
        use ConnectionState::*;
        use SessionEvent::*;

        match (self, event) {
            (_, Teardown) => Some(Disconnected),
            (Disconnected, Open) | (Disconnected, RetryElapsed) => Some(Connecting),
            (Connecting, TransportOpened) => Some(Connected),
            (Connecting, TransportClosed) | (Connected, TransportClosed) => Some(Disconnected),
            _ => None,
        }
    }
}

pub type FrameHandler = Arc<dyn Fn(&str) + Send + Sync>;

struct Shared {
    state_tx: watch::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    handler: RwLock<Option<FrameHandler>>,
}

impl Shared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state_tx,
            outbound: Mutex::new(None),
            handler: RwLock::new(None),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn apply(&self, event: SessionEvent) {
        self.state_tx.send_if_modified(|state| match state.on_event(event) {
            Some(next) if next != *state => {
                info!("Connection state: {} -> {} ({:?})", state, next, event);
                *state = next;
                true
            }
            Some(_) => false,
            None => {
                warn!("Ignoring {:?} while {}", event, state);
                false
            }
        });
    }

    fn set_outbound(&self, tx: Option<mpsc::UnboundedSender<String>>) {
        *lock(&self.outbound) = tx;
    }

    fn dispatch(&self, frame: &str) {
        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match handler {
            Some(handler) => handler(frame),
            None => debug!("No message handler registered; dropping frame"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable view of a session for components that only observe and send
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Queue a frame on the open connection. Never buffers across reconnects.
    pub fn send(&self, frame: String) -> Result<()> {
        if !self.is_connected() {
            return Err(AppError::NotConnected);
        }

        match lock(&self.shared.outbound).as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| AppError::NotConnected),
            None => Err(AppError::NotConnected),
        }
    }
}

struct SessionTask {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

pub struct TransportSession {
    url: String,
    retry_delay: Duration,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    task: Option<SessionTask>,
}

impl TransportSession {
    pub fn new(connector: Arc<dyn Connector>, url: impl Into<String>, retry_delay: Duration) -> Self {
        Self {
            url: url.into(),
            retry_delay,
            connector,
            shared: Arc::new(Shared::new()),
            task: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Register the inbound frame callback, replacing any previous one
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Start connecting. Must be called within a tokio runtime.
    pub fn open(&mut self) {
        if self.task.is_some() {
            debug!("Session already open for {}", self.url);
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shared.apply(SessionEvent::Open);

        let worker = Worker {
            url: self.url.clone(),
            retry_delay: self.retry_delay,
            connector: self.connector.clone(),
            shared: self.shared.clone(),
        };
        let handle = tokio::spawn(worker.run(shutdown_rx));

        self.task = Some(SessionTask {
            handle,
            shutdown_tx,
        });
    }

    /// Tear the session down, closing the socket and cancelling any pending retry
    pub async fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let _ = task.shutdown_tx.send(true);
        if let Err(e) = task.handle.await {
            if !e.is_cancelled() {
                error!("Session task failed: {}", e);
            }
        }

        self.shared.set_outbound(None);
        self.shared.apply(SessionEvent::Teardown);
        info!("Session closed for {}", self.url);
    }

    pub fn is_open(&self) -> bool {
        self.task.is_some()
    }

    pub fn send(&self, frame: String) -> Result<()> {
        self.handle().send(frame)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.handle.abort();
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Dropped,
}

struct Worker {
    url: String,
    retry_delay: Duration,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let connection_id = Uuid::new_v4();
            info!(%connection_id, url = %self.url, "Connecting to telemetry endpoint");

            let attempt = tokio::select! {
                res = self.connector.connect(&self.url) => res,
                _ = shutdown.changed() => break,
            };

            match attempt {
                Ok(connection) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.shared.set_outbound(Some(tx));
                    self.shared.apply(SessionEvent::TransportOpened);

                    let end = self
                        .drive(connection, rx, &mut shutdown, connection_id)
                        .await;

                    self.shared.set_outbound(None);
                    self.shared.apply(SessionEvent::TransportClosed);

                    if end == SessionEnd::Shutdown {
                        break;
                    }
                }
                Err(e) => {
                    warn!(%connection_id, "Connection attempt failed: {}", e);
                    self.shared.apply(SessionEvent::TransportClosed);
                }
            }

            info!("Reconnecting in {}s", self.retry_delay.as_secs_f32());
            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = shutdown.changed() => break,
            }
            self.shared.apply(SessionEvent::RetryElapsed);
        }

        debug!("Session task for {} stopped", self.url);
    }

    async fn drive(
        &self,
        mut connection: Box<dyn Connection>,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
        shutdown: &mut watch::Receiver<bool>,
        connection_id: Uuid,
    ) -> SessionEnd {
        info!(%connection_id, "Connected to {}", self.url);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    connection.close().await;
                    return SessionEnd::Shutdown;
                }
                inbound = connection.recv_text() => match inbound {
                    Some(Ok(text)) => self.shared.dispatch(&text),
                    Some(Err(e)) => {
                        warn!(%connection_id, "Connection error: {}", e);
                        return SessionEnd::Dropped;
                    }
                    None => {
                        info!(%connection_id, "Connection closed by server");
                        return SessionEnd::Dropped;
                    }
                },
                Some(frame) = outbound_rx.recv() => {
                    debug!(%connection_id, "Sending frame: {}", frame);
                    if let Err(e) = connection.send_text(frame).await {
                        warn!(%connection_id, "Failed to send frame: {}", e);
                        return SessionEnd::Dropped;
                    }
                }
            }
        }
    }
}
