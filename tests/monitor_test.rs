/// Monitor flow tests: inbound merge, trend sampling and relay dispatch
/// through an in-memory connector.
mod common;

use common::{update_frame, Attempt, FakeConnector, FakeServer, URL};
use gridx_monitor::{AppError, ConnectionState, Monitor, MonitorSettings, Snapshot};
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, watch};
use tokio_test::{assert_err, assert_ok};

async fn connected_monitor() -> (Monitor, FakeServer, mpsc::UnboundedReceiver<FakeServer>) {
    let (connector, mut servers) = FakeConnector::new(vec![Attempt::Accept]);
    let mut monitor = Monitor::new(connector, MonitorSettings::new(URL));
    let mut link = monitor.subscribe_connection();

    monitor.start();
    let server = servers.recv().await.unwrap();
    link.wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();

    (monitor, server, servers)
}

async fn wait_for_revision(updates: &mut watch::Receiver<u64>, target: u64) {
    updates.wait_for(|rev| *rev >= target).await.unwrap();
}

#[tokio::test]
async fn test_view_is_default_before_server_contact() {
    let (connector, _servers) = FakeConnector::new(vec![]);
    let monitor = Monitor::new(connector, MonitorSettings::new(URL));

    assert_eq!(monitor.view(), Snapshot::default());
    assert!(monitor.trend().is_empty());
    assert_eq!(monitor.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_inbound_update_merged_and_sampled() {
    let (mut monitor, server, _servers) = connected_monitor().await;
    let mut updates = monitor.subscribe_updates();

    server.push(update_frame(1040.0, 1012.0, [true, false, true, false]));
    wait_for_revision(&mut updates, 1).await;

    let view = monitor.view();
    assert!(view.pole.connected);
    assert_eq!(view.pole.power, 1040.0);
    assert_eq!(view.house.relays, [true, false, true, false]);
    assert_eq!(view.alerts.message, "System Optimal");

    let trend = monitor.trend();
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].pole_watts, 1040.0);
    assert_eq!(trend[0].house_watts, 1012.0);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_omitted_sections_keep_previous_values() {
    let (mut monitor, server, _servers) = connected_monitor().await;
    let mut updates = monitor.subscribe_updates();

    server.push(update_frame(800.0, 760.0, [false, true, false, false]));
    wait_for_revision(&mut updates, 1).await;
    let first = monitor.view();

    server.push(r#"{"type": "update", "data": {"alerts": {"theft_detected": true, "risk_score": 0.4, "message": "THEFT DETECTED: Line Loss Exceeds Threshold!"}}}"#);
    wait_for_revision(&mut updates, 2).await;

    let second = monitor.view();
    assert_eq!(second.pole, first.pole);
    assert_eq!(second.house, first.house);
    assert!(second.alerts.theft_detected);
    assert_eq!(second.house.relays.len(), 4);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_and_session_continues() {
    let (mut monitor, server, _servers) = connected_monitor().await;
    let mut updates = monitor.subscribe_updates();

    server.push(update_frame(500.0, 480.0, [false; 4]));
    wait_for_revision(&mut updates, 1).await;
    let before = monitor.view();

    server.push("not json");
    server.push(r#"{"type": "heartbeat"}"#);
    server.push(update_frame(510.0, 490.0, [false; 4]));
    wait_for_revision(&mut updates, 2).await;

    assert_eq!(*updates.borrow(), 2);
    assert_eq!(monitor.trend().len(), 2);
    assert_eq!(monitor.view().pole.power, 510.0);
    assert_eq!(before.pole.power, 500.0);
    assert_eq!(monitor.connection_state(), ConnectionState::Connected);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_set_relay_sends_one_frame_and_updates_view() {
    let (mut monitor, mut server, _servers) = connected_monitor().await;

    assert_ok!(monitor.set_relay(2, true));
    assert!(monitor.view().house.relays[2]);

    let frame: serde_json::Value = serde_json::from_str(&server.next_sent().await).unwrap();
    assert_eq!(
        frame,
        serde_json::json!({"action": "set_relay", "relay_index": 2, "state": true})
    );

    tokio::task::yield_now().await;
    assert!(server.nothing_more_sent());

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_server_value_overwrites_optimistic_relay() {
    let (mut monitor, mut server, _servers) = connected_monitor().await;
    let mut updates = monitor.subscribe_updates();

    assert_ok!(monitor.set_relay(1, true));
    wait_for_revision(&mut updates, 1).await;
    assert!(monitor.view().house.relays[1]);
    server.next_sent().await;

    // Hardware rejected the command: the server still reports relay 1 off
    server.push(update_frame(300.0, 290.0, [false, false, false, false]));
    wait_for_revision(&mut updates, 2).await;

    assert!(!monitor.view().house.relays[1]);

    monitor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_immediate_server_reply_lands_after_optimistic_write() {
    let (connector, mut servers) = FakeConnector::new(vec![Attempt::Echo]);
    let mut monitor = Monitor::new(connector, MonitorSettings::new(URL));
    let mut link = monitor.subscribe_connection();
    let mut updates = monitor.subscribe_updates();

    monitor.start();
    let _server = servers.recv().await.unwrap();
    link.wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();

    // Every command is answered with "all relays off" straight away, racing
    // the optimistic write. The server's answer is what must stay on screen.
    for round in 0..500 {
        let base = *updates.borrow();

        assert_ok!(monitor.set_relay(0, true));
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            wait_for_revision(&mut updates, base + 2),
        )
        .await
        .expect("server reply never applied");

        assert!(
            !monitor.view().house.relays[0],
            "round {}: optimistic value overwrote the server reply",
            round
        );
    }

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_toggle_relay_flips_current_state() {
    let (mut monitor, mut server, _servers) = connected_monitor().await;
    let mut updates = monitor.subscribe_updates();

    server.push(update_frame(300.0, 290.0, [false, false, false, true]));
    wait_for_revision(&mut updates, 1).await;

    let requested = monitor.toggle_relay(3).unwrap();

    assert!(!requested);
    let frame: serde_json::Value = serde_json::from_str(&server.next_sent().await).unwrap();
    assert_eq!(frame["relay_index"], 3);
    assert_eq!(frame["state"], false);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_out_of_range_relay_rejected() {
    let (mut monitor, mut server, _servers) = connected_monitor().await;
    let before = monitor.view();

    let result = monitor.set_relay(5, true);

    assert!(matches!(
        result,
        Err(AppError::RelayIndexOutOfRange { index: 5, count: 4 })
    ));
    assert_eq!(monitor.view(), before);
    tokio::task::yield_now().await;
    assert!(server.nothing_more_sent());

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_relay_rejected_while_offline() {
    let (connector, _servers) = FakeConnector::new(vec![]);
    let mut monitor = Monitor::new(connector, MonitorSettings::new(URL));
    monitor.start();

    let result = monitor.set_relay(0, true);

    assert_err!(&result);
    assert!(matches!(result, Err(AppError::Offline)));
    assert!(!monitor.view().house.relays[0]);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_trend_keeps_last_twenty_samples() {
    let (mut monitor, server, _servers) = connected_monitor().await;
    let mut updates = monitor.subscribe_updates();

    for n in 0..25 {
        server.push(update_frame(n as f64, n as f64 / 2.0, [false; 4]));
    }
    wait_for_revision(&mut updates, 25).await;

    let trend = monitor.trend();
    assert_eq!(trend.len(), 20);
    let pole: Vec<f64> = trend.iter().map(|s| s.pole_watts).collect();
    let expected: Vec<f64> = (5..25).map(|n| n as f64).collect();
    assert_eq!(pole, expected);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_bare_protocol_accepts_top_level_snapshot() {
    let (connector, mut servers) = FakeConnector::new(vec![Attempt::Accept]);
    let mut settings = MonitorSettings::new(URL);
    settings.protocol = gridx_monitor::WireProtocol::Bare;
    let mut monitor = Monitor::new(connector, settings);
    let mut updates = monitor.subscribe_updates();

    monitor.start();
    let server = servers.recv().await.unwrap();
    server.push(r#"{"pole": {"connected": true, "power": 640.0, "pf": 0.8}}"#);
    wait_for_revision(&mut updates, 1).await;

    assert_eq!(monitor.view().pole.power, 640.0);
    assert_eq!(monitor.view().pole.power_factor, 0.8);

    monitor.shutdown().await;
}
