pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod monitor;
pub mod report;
pub mod store;
pub mod telemetry;
pub mod trend;
pub mod ws;

// Re-export commonly used items
pub use config::Config;
pub use dispatch::CommandDispatcher;
pub use error::{AppError, Result};
pub use model::{Alerts, HouseReading, PoleReading, Snapshot, SnapshotUpdate, RELAY_COUNT};
pub use monitor::{Monitor, MonitorSettings};
pub use store::StateStore;
pub use trend::{TrendBuffer, TrendSample};
pub use ws::{ClientCommand, ConnectionState, ServerMessage, TransportSession, WireProtocol};
