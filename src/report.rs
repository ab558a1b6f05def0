//! Plain-text rendering of the synced state for the console front end.

use crate::model::{device_status, Snapshot};
use crate::trend::TrendSample;
use crate::ws::session::ConnectionState;
use std::fmt::Write;

/// One-line summary of both meters, relays and alerts
pub fn status_line(view: &Snapshot, link: ConnectionState) -> String {
    let pole = &view.pole;
    let house = &view.house;
    let alerts = &view.alerts;

    let relays: String = house
        .relays
        .iter()
        .map(|on| if *on { '1' } else { '0' })
        .collect();

    let mut line = format!(
        "[{}] Grid: {} {:.1}V {:.2}A {:.0}W {:.2}kWh PF {:.2} | SPAN: {} {:.1}V {:.2}A {:.0}W {:.2}kWh PF {:.2} {:.1}°C | relays {} | risk {:.2} | {}",
        link,
        device_status(pole.connected),
        pole.voltage,
        pole.current,
        pole.power,
        pole.energy,
        pole.power_factor,
        device_status(house.connected),
        house.voltage,
        house.current,
        house.power,
        house.energy,
        house.power_factor,
        house.temperature,
        relays,
        alerts.display_risk_score(),
        alerts.message,
    );

    if alerts.theft_detected {
        line.push_str(" | THEFT DETECTED");
    }
    if alerts.maintenance_risk {
        line.push_str(" | MAINTENANCE REQUIRED");
    }
    if house.is_overheating() {
        line.push_str(" | PANEL OVERHEATING");
    }

    line
}

pub fn trend_table(samples: &[TrendSample]) -> String {
    if samples.is_empty() {
        return "no trend samples yet".to_string();
    }

    let mut out = String::from("time      pole W   house W\n");
    for sample in samples {
        let _ = writeln!(
            out,
            "{:<8} {:>8.0} {:>9.0}",
            sample.timestamp, sample.pole_watts, sample.house_watts
        );
    }
    out
}
