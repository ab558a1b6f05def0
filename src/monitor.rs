use crate::config::Config;
use crate::dispatch::CommandDispatcher;
use crate::error::Result;
use crate::model::Snapshot;
use crate::telemetry::SharedTelemetry;
use crate::trend::{TrendSample, DEFAULT_CAPACITY};
use crate::ws::connection::Connector;
use crate::ws::protocol::WireProtocol;
use crate::ws::session::{ConnectionState, TransportSession, DEFAULT_RETRY_DELAY};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub url: String,
    pub retry_delay: Duration,
    pub protocol: WireProtocol,
    pub trend_capacity: usize,
}

impl MonitorSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
            protocol: WireProtocol::default(),
            trend_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            url: config.server.url.clone(),
            retry_delay: config.server.reconnect_delay(),
            protocol: config.server.protocol,
            trend_capacity: config.trend.capacity,
        }
    }
}

/// Owning scope for one monitoring client: session, telemetry and dispatcher.
/// Dropping it aborts the session task.
pub struct Monitor {
    session: TransportSession,
    telemetry: SharedTelemetry,
    dispatcher: CommandDispatcher,
    protocol: WireProtocol,
}

impl Monitor {
    pub fn new(connector: Arc<dyn Connector>, settings: MonitorSettings) -> Self {
        let session = TransportSession::new(connector, settings.url, settings.retry_delay);
        let telemetry = SharedTelemetry::new(settings.trend_capacity);
        let dispatcher = CommandDispatcher::new(session.handle(), telemetry.clone());

        Self {
            session,
            telemetry,
            dispatcher,
            protocol: settings.protocol,
        }
    }

    /// Wire the inbound path and open the session
    pub fn start(&mut self) {
        let telemetry = self.telemetry.clone();
        let protocol = self.protocol;

        self.session.on_message(move |frame| {
            if let Err(e) = telemetry.ingest(frame, protocol) {
                warn!("Dropping inbound frame: {}", e);
                debug!("Raw frame: {}", frame);
            }
        });

        info!(
            "Starting monitor for {} ({:?} protocol)",
            self.session.url(),
            protocol
        );
        self.session.open();
    }

    pub async fn shutdown(&mut self) {
        self.session.close().await;
    }

    pub fn set_relay(&self, index: usize, desired: bool) -> Result<()> {
        self.dispatcher.set_relay(index, desired)
    }

    pub fn toggle_relay(&self, index: usize) -> Result<bool> {
        self.dispatcher.toggle_relay(index)
    }

    pub fn view(&self) -> Snapshot {
        self.telemetry.view()
    }

    pub fn trend(&self) -> Vec<TrendSample> {
        self.telemetry.trend()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.session.subscribe()
    }

    /// Revision counter bumped on every accepted snapshot or local relay write
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.telemetry.subscribe()
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone()
    }

    pub fn telemetry(&self) -> SharedTelemetry {
        self.telemetry.clone()
    }
}
