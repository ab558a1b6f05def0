use crate::error::{AppError, Result};
use crate::model::{Snapshot, SnapshotUpdate, RELAY_COUNT};
use tracing::{debug, error};

/// Single writer of the live snapshot.
///
/// Remote updates replace whole sections; local relay writes are optimistic
/// and get overwritten by the next house section the server sends.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    snapshot: Snapshot,
    remote_updates: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_remote_snapshot(&mut self, update: SnapshotUpdate) {
        let SnapshotUpdate { pole, house, alerts } = update;

        if let Some(pole) = pole {
            self.snapshot.pole = pole;
        }
        if let Some(house) = house {
            self.snapshot.house = house;
        }
        if let Some(alerts) = alerts {
            self.snapshot.alerts = alerts;
        }

        self.remote_updates += 1;
        debug!("Applied remote snapshot #{}", self.remote_updates);
    }

    pub fn apply_local_relay_mutation(&mut self, index: usize, state: bool) -> Result<()> {
        let slot = self.snapshot.house.relays.get_mut(index).ok_or_else(|| {
            error!("Relay index {} out of range (circuits: {})", index, RELAY_COUNT);
            AppError::RelayIndexOutOfRange {
                index,
                count: RELAY_COUNT,
            }
        })?;

        *slot = state;
        debug!("Optimistic relay {} -> {}", index, state);
        Ok(())
    }

    /// Current merged view; the all-zero default until the server speaks
    pub fn view(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn has_remote_data(&self) -> bool {
        self.remote_updates > 0
    }

    pub fn remote_updates(&self) -> u64 {
        self.remote_updates
    }
}
