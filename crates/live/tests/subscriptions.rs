//! Integration tests for subscription control and the connection worker,
//! driven through [`LiveTelemetry`] with an in-memory transport.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use weldwatch_core::telemetry::{
    DeviceStatus, HealthColor, Placement, ThresholdConfig, Topology,
};
use weldwatch_core::types::DeviceId;
use weldwatch_events::ChangeKind;
use weldwatch_live::testing::{test_config, wait_for, MockTransport};
use weldwatch_live::{LiveConfig, LiveError, LiveTelemetry, StalePolicy, TransportEvent};

fn ids(names: &[&str]) -> Vec<DeviceId> {
    names.iter().map(|name| DeviceId::new(*name)).collect()
}

fn start(transport: &MockTransport, config: LiveConfig) -> Arc<LiveTelemetry> {
    LiveTelemetry::start(Arc::new(transport.clone()), config)
}

fn running(current: f64) -> serde_json::Value {
    json!({
        "status": "RUNNING",
        "current": current,
        "voltage": 22.0,
        "gasFlow": 12.0,
        "rfid": "OP-1",
    })
}

// ---------------------------------------------------------------------------
// Test: 100 samples for one of two started devices
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_reflects_last_of_many_samples() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    let d1 = DeviceId::new("d1");
    let d2 = DeviceId::new("d2");
    let configs = HashMap::from([
        (d1.clone(), ThresholdConfig::unbounded().with_current(50.0, 150.0)),
        (d2.clone(), ThresholdConfig::unbounded().with_current(50.0, 150.0)),
    ]);

    live.subscribe(&[d1.clone(), d2.clone()], configs).await.expect("subscribe");

    for i in 0..100 {
        assert!(transport.push_sample("d1", running(60.0 + i as f64)));
    }
    assert!(wait_for(|| live.counters().samples_applied == 100).await);

    let record = live.device_snapshot(&d1).expect("tracked");
    assert_eq!(record.reading.filtered_current, 159.0);
    assert_eq!(record.reading.status, DeviceStatus::Running);
    assert_eq!(record.reading.health_color, HealthColor::Red);
    assert_eq!(record.reading.identity_tag, "OP-1");

    let silent = live.device_snapshot(&d2).expect("tracked");
    assert_eq!(silent.reading.status, DeviceStatus::NoStatus);
    assert_eq!(silent.reading.health_color, HealthColor::Grey);
    assert!(silent.updated_at.is_none());

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: starting the same device twice is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_is_idempotent() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());

    live.subscribe(&ids(&["d1"]), HashMap::new()).await.unwrap();
    live.subscribe(&ids(&["d1"]), HashMap::new()).await.unwrap();

    assert_eq!(transport.subscribe_log(), ids(&["d1"]));
    assert_eq!(live.snapshot_all().len(), 1);
    assert_eq!(live.active_devices(), ids(&["d1"]));

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a new device with no sample reads NO_STATUS / GREY
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_device_is_grey() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());

    live.subscribe(&ids(&["d1"]), HashMap::new()).await.unwrap();

    let record = live.device_snapshot(&DeviceId::new("d1")).unwrap();
    assert_eq!(record.reading.status, DeviceStatus::NoStatus);
    assert_eq!(record.reading.health_color, HealthColor::Grey);

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: any invalid config rejects the whole start without side effects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_config_has_no_side_effects() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    let configs = HashMap::from([
        (DeviceId::new("d1"), ThresholdConfig::unbounded().with_current(50.0, 150.0)),
        (DeviceId::new("d2"), ThresholdConfig::unbounded().with_voltage(40.0, 10.0)),
    ]);

    let result = live.subscribe(&ids(&["d1", "d2"]), configs).await;

    assert_matches!(result, Err(LiveError::InvalidConfig(_)));
    assert!(live.snapshot_all().is_empty());
    assert!(live.active_devices().is_empty());
    assert!(transport.subscribe_log().is_empty());

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: samples for channels nobody started are dropped and counted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sample_for_unknown_device_is_dropped() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["hw-1"]), HashMap::new()).await.unwrap();

    assert!(transport.push_event(TransportEvent::Message {
        channel: DeviceId::new("hw-2"),
        payload: running(100.0),
    }));

    assert!(wait_for(|| live.counters().unknown_device_drops == 1).await);
    assert!(live.device_snapshot(&DeviceId::new("hw-2")).is_none());
    assert_eq!(live.counters().samples_applied, 0);

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: malformed frames are counted, never fatal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_frames_are_counted() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["d1"]), HashMap::new()).await.unwrap();

    transport.push_event(TransportEvent::Malformed {
        reason: "not json".into(),
    });
    transport.push_sample("d1", json!({"current": "a lot"}));
    transport.push_sample("d1", running(100.0));

    assert!(wait_for(|| live.counters().samples_applied == 1).await);
    assert_eq!(live.counters().malformed_frames, 2);
    assert!(live.is_connected());

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: after a drop the worker reconnects and re-registers every device
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_reregisters_all_subscriptions() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["d1", "d2"]), HashMap::new()).await.unwrap();
    assert!(live.is_connected());

    transport.drop_connection();

    let expected: BTreeSet<DeviceId> = ids(&["d1", "d2"]).into_iter().collect();
    assert!(
        wait_for(|| transport.connect_count() >= 2 && transport.subscribed() == expected).await
    );
    assert!(wait_for(|| live.is_connected()).await);

    let status = live.connection_status();
    assert!(status.last_disconnect_at.is_some());
    assert!(status.last_reconnect_at.is_some());
    assert_eq!(status.reconnect_attempts, 0);
    assert_eq!(live.counters().reconnects, 1);

    assert!(transport.push_sample("d2", running(100.0)));
    assert!(wait_for(|| live.counters().samples_applied == 1).await);

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: start while the stream is unreachable times out, then recovers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_times_out_while_disconnected() {
    let transport = MockTransport::new();
    transport.set_fail_connect(true);
    let live = start(&transport, test_config());

    let result = live.subscribe(&ids(&["d1"]), HashMap::new()).await;

    assert_matches!(result, Err(LiveError::SubscriptionTimeout { pending: 1 }));
    assert!(!live.is_connected());
    assert!(live.connection_status().reconnect_attempts >= 1);
    // The record exists and the device stays desired.
    assert!(live.device_snapshot(&DeviceId::new("d1")).is_some());

    transport.set_fail_connect(false);
    assert!(wait_for(|| transport.subscribed().contains(&DeviceId::new("d1"))).await);
    assert!(wait_for(|| live.is_connected()).await);
    assert!(live.counters().transport_errors >= 1);

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: stopping while offline does not wait for the stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_while_disconnected_completes() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["d1"]), HashMap::new()).await.unwrap();

    transport.set_fail_connect(true);
    transport.drop_connection();
    assert!(wait_for(|| !live.is_connected()).await);

    live.unsubscribe(&ids(&["d1"])).await.expect("offline stop is immediate");
    assert!(live.device_snapshot(&DeviceId::new("d1")).is_none());

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: ClearAfter forces NO_STATUS once the outage lasts long enough
// ---------------------------------------------------------------------------

#[tokio::test]
async fn outage_clears_readings_when_configured() {
    let transport = MockTransport::new();
    let config = LiveConfig {
        stale_policy: StalePolicy::ClearAfter(Duration::from_millis(50)),
        ..test_config()
    };
    let live = start(&transport, config);
    let mut changes = live.change_feed();
    let d1 = DeviceId::new("d1");
    live.subscribe(&[d1.clone()], HashMap::new()).await.unwrap();

    transport.push_sample("d1", running(100.0));
    assert!(wait_for(|| live.counters().samples_applied == 1).await);

    transport.set_fail_connect(true);
    transport.drop_connection();

    let cleared = || {
        live.device_snapshot(&d1).map(|r| r.reading.status) == Some(DeviceStatus::NoStatus)
    };
    assert!(wait_for(cleared).await);
    assert_eq!(live.device_snapshot(&d1).unwrap().reading.health_color, HealthColor::Grey);

    let kinds: Vec<ChangeKind> = std::iter::from_fn(|| changes.try_recv().ok())
        .map(|c| c.kind)
        .collect();
    assert!(kinds.contains(&ChangeKind::Cleared));

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: default policy keeps the last known reading during an outage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn outage_retains_last_known_by_default() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    let d1 = DeviceId::new("d1");
    live.subscribe(&[d1.clone()], HashMap::new()).await.unwrap();

    transport.push_sample("d1", json!({"status": "STOP"}));
    assert!(wait_for(|| live.counters().samples_applied == 1).await);

    transport.set_fail_connect(true);
    transport.drop_connection();
    assert!(wait_for(|| !live.is_connected()).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let record = live.device_snapshot(&d1).unwrap();
    assert_eq!(record.reading.status, DeviceStatus::Stop);
    assert_eq!(record.reading.health_color, HealthColor::Yellow);

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: pause keeps the snapshot, unsubscribe removes it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_keeps_snapshot_and_unsubscribe_removes() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["d1", "d2"]), HashMap::new()).await.unwrap();
    transport.push_sample("d1", running(100.0));
    assert!(wait_for(|| live.counters().samples_applied == 1).await);

    live.pause(&ids(&["d1"])).await.unwrap();
    live.unsubscribe(&ids(&["d2"])).await.unwrap();

    assert!(transport.subscribed().is_empty());
    let paused = live.device_snapshot(&DeviceId::new("d1")).expect("paused record kept");
    assert_eq!(paused.reading.status, DeviceStatus::Running);
    assert!(live.device_snapshot(&DeviceId::new("d2")).is_none());
    assert!(live.active_devices().is_empty());

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: shutdown releases every channel and rejects further calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_unsubscribes_and_closes() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["d1", "d2"]), HashMap::new()).await.unwrap();

    live.shutdown().await;

    assert!(transport.subscribed().is_empty());
    assert!(!transport.is_connected());
    assert!(!live.is_connected());
    assert_matches!(
        live.subscribe(&ids(&["d3"]), HashMap::new()).await,
        Err(LiveError::Closed)
    );
    assert_matches!(live.pause(&ids(&["d1"])).await, Err(LiveError::Closed));
    // Records remain readable after teardown.
    assert!(live.device_snapshot(&DeviceId::new("d1")).is_some());
}

// ---------------------------------------------------------------------------
// Test: a stuck unsubscribe cannot keep the worker alive after shutdown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn shutdown_releases_transport_when_unsubscribe_hangs() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["d1"]), HashMap::new()).await.unwrap();
    assert_eq!(transport.handle_count(), 3);

    transport.set_hang_unsubscribe(true);
    live.shutdown().await;

    // Only the test's own clone is left: the worker and its connection are gone.
    assert_eq!(transport.handle_count(), 1);
    assert!(!transport.is_connected());
    assert!(!live.is_connected());
}

// ---------------------------------------------------------------------------
// Test: a threshold update never recreates an unsubscribed device
// ---------------------------------------------------------------------------

#[tokio::test]
async fn threshold_update_after_unsubscribe_is_rejected() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    let d1 = DeviceId::new("d1");
    live.subscribe(&[d1.clone()], HashMap::new()).await.unwrap();

    let record = live
        .upsert_thresholds(&d1, ThresholdConfig::unbounded().with_current(10.0, 20.0))
        .expect("tracked device");
    assert_eq!(record.config.current.high, Some(20.0));

    live.unsubscribe(&[d1.clone()]).await.unwrap();

    let result = live.upsert_thresholds(&d1, ThresholdConfig::unbounded());
    assert_matches!(result, Err(LiveError::UnknownDevice(id)) if id == d1);
    assert!(live.device_snapshot(&d1).is_none());
    assert!(live.snapshot_all().is_empty());

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: topology thresholds apply to devices started without a config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn topology_supplies_thresholds_and_groups() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.replace_topology(Topology::new().with_device(
        "hw-1",
        Placement {
            station: Some("Cell 1".into()),
            machine_type: Some("MIG".into()),
            thresholds: Some(ThresholdConfig::unbounded().with_current(50.0, 150.0)),
        },
    ));

    live.subscribe(&ids(&["hw-1", "hw-9"]), HashMap::new()).await.unwrap();
    transport.push_sample("hw-1", running(160.0));
    assert!(wait_for(|| live.counters().samples_applied == 1).await);

    let hw1 = live.device_snapshot(&DeviceId::new("hw-1")).unwrap();
    assert_eq!(hw1.reading.health_color, HealthColor::Red);

    let stations: Vec<String> = live.station_summaries().into_iter().map(|s| s.group).collect();
    assert_eq!(stations, vec!["Cell 1".to_string(), "Uncategorized".to_string()]);

    let cell = live.station_summary("Cell 1").expect("station known");
    assert_eq!(cell.device_count, 1);
    assert_eq!(cell.health_counts.red, 1);
    assert!(live.machine_type_summary("TIG").is_none());

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a topology refresh pushes new thresholds into tracked records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn topology_refresh_rederives_health() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["hw-1", "hw-2"]), HashMap::new()).await.unwrap();
    transport.push_sample("hw-1", running(160.0));
    assert!(wait_for(|| live.counters().samples_applied == 1).await);
    assert_eq!(
        live.device_snapshot(&DeviceId::new("hw-1")).unwrap().reading.health_color,
        HealthColor::Green
    );

    let updated = live.replace_topology(
        Topology::new()
            .with_device(
                "hw-1",
                Placement {
                    thresholds: Some(ThresholdConfig::unbounded().with_current(50.0, 150.0)),
                    ..Placement::default()
                },
            )
            .with_device(
                "hw-2",
                Placement {
                    thresholds: Some(ThresholdConfig::unbounded().with_current(10.0, 1.0)),
                    ..Placement::default()
                },
            ),
    );

    assert_eq!(updated, 1);
    assert_eq!(
        live.device_snapshot(&DeviceId::new("hw-1")).unwrap().reading.health_color,
        HealthColor::Red
    );

    live.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: every applied sample reaches change-feed subscribers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn change_feed_fans_out_samples() {
    let transport = MockTransport::new();
    let live = start(&transport, test_config());
    live.subscribe(&ids(&["d1"]), HashMap::new()).await.unwrap();
    let mut first = live.change_feed();
    let mut second = live.change_feed();

    transport.push_sample("d1", running(100.0));

    let change = tokio::time::timeout(Duration::from_secs(2), first.recv())
        .await
        .expect("in time")
        .expect("open feed");
    assert_eq!(change.device_id, DeviceId::new("d1"));
    assert_eq!(change.kind, ChangeKind::Sample);
    assert_eq!(second.recv().await.unwrap().kind, ChangeKind::Sample);

    live.shutdown().await;
}
