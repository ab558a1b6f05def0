//! In-memory transport used by the session and monitor tests
#![allow(dead_code)]

use async_trait::async_trait;
use gridx_monitor::ws::{Connection, Connector};
use gridx_monitor::{AppError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const URL: &str = "ws://fake-host/ws/client";

/// What the next connect attempt does. Attempts beyond the script are refused.
#[derive(Debug, Clone, Copy)]
pub enum Attempt {
    Refuse,
    Accept,
    Hang,
    /// Accept, and answer every client frame with [`RELAYS_OFF_REPLY`]
    /// on the same connection
    Echo,
}

/// Server verdict that every relay is off
pub const RELAYS_OFF_REPLY: &str =
    r#"{"type": "update", "data": {"house": {"connected": true, "relays": [false, false, false, false]}}}"#;

pub struct FakeConnector {
    attempts: AtomicUsize,
    script: Mutex<VecDeque<Attempt>>,
    servers: mpsc::UnboundedSender<FakeServer>,
}

impl FakeConnector {
    pub fn new(script: Vec<Attempt>) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            script: Mutex::new(script.into()),
            servers,
        });
        (connector, accepted)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Connection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Refuse);

        match next {
            Attempt::Refuse => Err(AppError::WebSocket("connection refused".to_string())),
            Attempt::Hang => std::future::pending().await,
            Attempt::Accept | Attempt::Echo => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let echo = matches!(next, Attempt::Echo).then(|| inbound_tx.clone());
                let _ = self.servers.send(FakeServer {
                    inbound: Some(inbound_tx),
                    outbound: outbound_rx,
                });
                Ok(Box::new(FakeConnection {
                    inbound: inbound_rx,
                    outbound: outbound_tx,
                    echo,
                }))
            }
        }
    }
}

struct FakeConnection {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    echo: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .map_err(|_| AppError::WebSocket("peer gone".to_string()))?;
        if let Some(echo) = &self.echo {
            let _ = echo.send(RELAYS_OFF_REPLY.to_string());
        }
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

/// Server side of one accepted fake connection
pub struct FakeServer {
    inbound: Option<mpsc::UnboundedSender<String>>,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl FakeServer {
    pub fn push(&self, frame: impl Into<String>) {
        if let Some(tx) = &self.inbound {
            tx.send(frame.into()).unwrap();
        }
    }

    /// Simulate the server closing the socket
    pub fn close(&mut self) {
        self.inbound = None;
    }

    pub async fn next_sent(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.outbound.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client connection dropped")
    }

    pub fn nothing_more_sent(&mut self) -> bool {
        matches!(
            self.outbound.try_recv(),
            Err(mpsc::error::TryRecvError::Empty) | Err(mpsc::error::TryRecvError::Disconnected)
        )
    }
}

pub fn update_frame(pole_w: f64, house_w: f64, relays: [bool; 4]) -> String {
    serde_json::json!({
        "type": "update",
        "data": {
            "pole": {"connected": true, "voltage": 230.1, "power": pole_w, "current": 4.2,
                     "energy": 10.5, "frequency": 50.0, "pf": 0.96},
            "house": {"connected": true, "voltage": 229.7, "power": house_w, "current": 4.0,
                      "energy": 10.1, "temperature": 29.5, "pf": 0.94, "relays": relays},
            "alerts": {"theft_detected": false, "maintenance_risk": false,
                       "risk_score": 0.0, "message": "System Optimal"}
        }
    })
    .to_string()
}
