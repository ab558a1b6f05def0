use crate::error::Result;
use crate::model::Snapshot;
use crate::store::StateStore;
use crate::trend::{TrendBuffer, TrendSample};
use crate::ws::protocol::{decode_frame, WireProtocol};
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Store and trend buffer, mutated together by the merge step
#[derive(Debug, Clone)]
pub struct Telemetry {
    store: StateStore,
    trend: TrendBuffer,
}

impl Telemetry {
    pub fn new(trend_capacity: usize) -> Self {
        Self {
            store: StateStore::new(),
            trend: TrendBuffer::new(trend_capacity),
        }
    }

    /// Decode a frame, merge it and append one trend sample.
    /// A frame that fails to decode leaves both untouched.
    pub fn ingest(&mut self, frame: &str, protocol: WireProtocol, at: DateTime<Local>) -> Result<()> {
        let update = decode_frame(frame, protocol)?;
        self.store.apply_remote_snapshot(update);
        self.trend
            .append(TrendSample::from_view(self.store.view(), &at));
        Ok(())
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    pub fn trend(&self) -> &TrendBuffer {
        &self.trend
    }
}

/// Single owner of [`Telemetry`] shared between the session task and the
/// dispatcher. Every accepted change bumps a revision watchers can await.
#[derive(Clone)]
pub struct SharedTelemetry {
    inner: Arc<Mutex<Telemetry>>,
    revision: Arc<watch::Sender<u64>>,
}

impl SharedTelemetry {
    pub fn new(trend_capacity: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Telemetry::new(trend_capacity))),
            revision: Arc::new(revision),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Telemetry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    pub fn ingest(&self, frame: &str, protocol: WireProtocol) -> Result<()> {
        self.lock().ingest(frame, protocol, Local::now())?;
        self.bump();
        Ok(())
    }

    pub fn apply_local_relay_mutation(&self, index: usize, state: bool) -> Result<()> {
        self.lock().store_mut().apply_local_relay_mutation(index, state)?;
        self.bump();
        Ok(())
    }

    /// Write `relays[index]` and run `send` under the same lock, so a reply
    /// ingested by the session task always lands after the optimistic value.
    /// A failed send restores the previous value and leaves the revision alone.
    ///
    /// `send` must not call back into this `SharedTelemetry`.
    pub fn apply_optimistic_relay<F>(&self, index: usize, state: bool, send: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        {
            let mut telemetry = self.lock();
            let previous = telemetry.store().view().house.relays.get(index).copied();
            telemetry
                .store_mut()
                .apply_local_relay_mutation(index, state)?;

            if let Err(e) = send() {
                if let Some(previous) = previous {
                    telemetry
                        .store_mut()
                        .apply_local_relay_mutation(index, previous)?;
                }
                return Err(e);
            }
        }

        self.bump();
        Ok(())
    }

    pub fn view(&self) -> Snapshot {
        self.lock().store().view().clone()
    }

    pub fn trend(&self) -> Vec<TrendSample> {
        self.lock().trend().snapshot()
    }

    pub fn has_remote_data(&self) -> bool {
        self.lock().store().has_remote_data()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
