use crate::error::{AppError, Result};
use crate::model::RELAY_COUNT;
use crate::telemetry::SharedTelemetry;
use crate::ws::protocol::{encode_command, ClientCommand};
use crate::ws::session::SessionHandle;
use tracing::{error, info, warn};

/// Turns relay intents into `set_relay` frames plus an optimistic local write.
///
/// While the session is not connected commands are rejected with
/// [`AppError::Offline`] and the view is left as the server last reported it.
#[derive(Clone)]
pub struct CommandDispatcher {
    session: SessionHandle,
    telemetry: SharedTelemetry,
}

impl CommandDispatcher {
    pub fn new(session: SessionHandle, telemetry: SharedTelemetry) -> Self {
        Self { session, telemetry }
    }

    pub fn set_relay(&self, index: usize, desired: bool) -> Result<()> {
        if index >= RELAY_COUNT {
            error!("Relay index {} out of range (circuits: {})", index, RELAY_COUNT);
            return Err(AppError::RelayIndexOutOfRange {
                index,
                count: RELAY_COUNT,
            });
        }

        if !self.session.is_connected() {
            warn!("System offline: relay {} command not sent", index);
            return Err(AppError::Offline);
        }

        let frame = encode_command(&ClientCommand::set_relay(index, desired))?;
        self.telemetry
            .apply_optimistic_relay(index, desired, || {
                self.session.send(frame).map_err(|e| {
                    warn!("Relay {} command dropped: {}", index, e);
                    AppError::Offline
                })
            })?;

        info!("Relay {} set to {}", index, if desired { "on" } else { "off" });
        Ok(())
    }

    /// Flip the relay relative to the current view and return the requested state
    pub fn toggle_relay(&self, index: usize) -> Result<bool> {
        let current = self
            .telemetry
            .view()
            .house
            .relays
            .get(index)
            .copied()
            .ok_or(AppError::RelayIndexOutOfRange {
                index,
                count: RELAY_COUNT,
            })?;

        self.set_relay(index, !current)?;
        Ok(!current)
    }
}
