use crate::error::{AppError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Opens push connections to the telemetry endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>>;
}

/// One open full-duplex text-frame connection
#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next inbound text frame. `None` once the peer has closed the stream.
    async fn recv_text(&mut self) -> Option<Result<String>>;

    async fn close(&mut self);
}

/// Upper bound on TCP connect plus WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>> {
        let (stream, response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| {
                    AppError::WebSocket(format!(
                        "handshake with {} timed out after {:?}",
                        url, self.connect_timeout
                    ))
                })??;
        debug!("WebSocket handshake completed: HTTP {}", response.status());
        Ok(Box::new(WsConnection { stream }))
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(AppError::from(e))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(text)),
                Message::Close(frame) => {
                    info!("Server closed connection: {:?}", frame);
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    // tungstenite answers pings while reading
                }
                Message::Binary(data) => {
                    warn!("Ignoring unexpected binary frame ({} bytes)", data.len());
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close handshake failed: {}", e);
        }
    }
}
