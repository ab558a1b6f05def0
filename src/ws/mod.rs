pub mod connection;
pub mod protocol;
pub mod session;

pub use connection::{Connection, Connector, TungsteniteConnector};
pub use protocol::{decode_frame, encode_command, ClientCommand, ServerMessage, WireProtocol};
pub use session::{ConnectionState, SessionEvent, SessionHandle, TransportSession};
