//! Telemetry snapshot types shared by the store, the codec and consumers.
//!
//! Numeric fields tolerate `null` and absence on the wire: both decode to the
//! field's default rather than failing the whole frame.

use serde::{Deserialize, Deserializer, Serialize};

/// Number of switchable circuits on the house panel
pub const RELAY_COUNT: usize = 4;

/// Panel temperature above which the house reading is flagged as overheating (°C)
pub const OVERHEAT_THRESHOLD_C: f64 = 40.0;

/// Alert message shown before the server has said anything
pub const WAITING_MESSAGE: &str = "Waiting for connection...";

/// Grid supply meter on the pole
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoleReading {
    #[serde(deserialize_with = "null_as_default")]
    pub connected: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub voltage: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub current: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub power: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub energy: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub frequency: f64,
    #[serde(rename = "pf", deserialize_with = "null_as_default")]
    pub power_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

/// Smart panel in the house, including its relay bank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseReading {
    #[serde(deserialize_with = "null_as_default")]
    pub connected: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub voltage: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub current: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub power: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub energy: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub temperature: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub frequency: f64,
    #[serde(rename = "pf", deserialize_with = "null_as_default")]
    pub power_factor: f64,
    #[serde(deserialize_with = "relay_bank")]
    pub relays: [bool; RELAY_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl HouseReading {
    pub fn is_overheating(&self) -> bool {
        self.temperature > OVERHEAT_THRESHOLD_C
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    #[serde(deserialize_with = "null_as_default")]
    pub theft_detected: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub maintenance_risk: bool,
    /// Stored exactly as received; use [`Alerts::display_risk_score`] for presentation
    #[serde(deserialize_with = "null_as_default")]
    pub risk_score: f64,
    /// [`WAITING_MESSAGE`] only before any contact; a section without a
    /// message decodes to an empty string
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            theft_detected: false,
            maintenance_risk: false,
            risk_score: 0.0,
            message: WAITING_MESSAGE.to_string(),
        }
    }
}

impl Alerts {
    /// Risk score clamped to [0, 1]; NaN displays as 0
    pub fn display_risk_score(&self) -> f64 {
        if self.risk_score.is_nan() {
            return 0.0;
        }
        self.risk_score.clamp(0.0, 1.0)
    }

    pub fn risk_percent(&self) -> f64 {
        self.display_risk_score() * 100.0
    }
}

/// Full known state of pole, house and alerts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub pole: PoleReading,
    pub house: HouseReading,
    pub alerts: Alerts,
}

/// Partial snapshot as carried by one inbound frame. Absent sections are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pole: Option<PoleReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<HouseReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Alerts>,
}

impl SnapshotUpdate {
    pub fn is_empty(&self) -> bool {
        self.pole.is_none() && self.house.is_none() && self.alerts.is_none()
    }
}

impl From<Snapshot> for SnapshotUpdate {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            pole: Some(snapshot.pole),
            house: Some(snapshot.house),
            alerts: Some(snapshot.alerts),
        }
    }
}

pub fn device_status(connected: bool) -> &'static str {
    if connected {
        "Online"
    } else {
        "Offline"
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fixes the relay bank at [`RELAY_COUNT`] entries: extra entries are dropped,
/// missing ones are off.
fn relay_bank<'de, D>(deserializer: D) -> Result<[bool; RELAY_COUNT], D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<bool>>>::deserialize(deserializer)?.unwrap_or_default();
    if raw.len() != RELAY_COUNT {
        tracing::warn!(
            "Relay bank has {} entries, expected {}; normalizing",
            raw.len(),
            RELAY_COUNT
        );
    }

    let mut relays = [false; RELAY_COUNT];
    for (slot, value) in relays.iter_mut().zip(raw) {
        *slot = value.unwrap_or(false);
    }
    Ok(relays)
}
