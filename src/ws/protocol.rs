use crate::error::{AppError, Result};
use crate::model::SnapshotUpdate;
use serde::{Deserialize, Serialize};

/// Shape of inbound telemetry frames.
///
/// `Enveloped` is the canonical protocol. `Bare` is the older shape where the
/// server pushes the snapshot object at top level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireProtocol {
    #[default]
    Enveloped,
    Bare,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Update { data: SnapshotUpdate },
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    SetRelay { relay_index: usize, state: bool },
}

impl ServerMessage {
    pub fn update(data: SnapshotUpdate) -> Self {
        ServerMessage::Update { data }
    }
}

impl ClientCommand {
    pub fn set_relay(relay_index: usize, state: bool) -> Self {
        ClientCommand::SetRelay { relay_index, state }
    }
}

/// Decode one inbound text frame into a snapshot update
pub fn decode_frame(text: &str, protocol: WireProtocol) -> Result<SnapshotUpdate> {
    let update = match protocol {
        WireProtocol::Enveloped => match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::Update { data }) => data,
            Err(e) => return Err(AppError::Decode(e.to_string())),
        },
        WireProtocol::Bare => {
            serde_json::from_str::<SnapshotUpdate>(text).map_err(|e| AppError::Decode(e.to_string()))?
        }
    };

    if update.is_empty() {
        return Err(AppError::Decode(
            "update carries no pole, house or alerts section".to_string(),
        ));
    }

    Ok(update)
}

pub fn encode_command(command: &ClientCommand) -> Result<String> {
    Ok(serde_json::to_string(command)?)
}
