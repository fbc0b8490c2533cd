//! End-to-end resource lifecycle scenarios against a scripted control plane.
//!
//! These tests validate the full create → wait → delete flow for each
//! resource kind the harness polls:
//!
//! 1. Boot a server, watch it converge to ACTIVE, tear it down
//! 2. Volume and snapshot builds and deletions
//! 3. Alarm state transitions and meter samples
//!
//! ## Running
//!
//! ```bash
//! cargo test -p nimbus-e2e --test resource_lifecycle
//! ```

use std::time::Duration;

use nimbus_clients::compute::CreateServerRequest;
use nimbus_clients::naming::rand_name;
use nimbus_clients::telemetry::CreateAlarmRequest;
use nimbus_clients::volume::{CreateSnapshotRequest, CreateVolumeRequest};
use nimbus_clients::{
    ComputeClient, ProbeConfig, TelemetryClient, VolumeClient, WaitOptions,
};
use nimbus_convergence::{AccessError, PollBudget};
use nimbus_testing::{init_test_tracing, ScriptedResponder};
use nimbus_tracker::ResourceTracker;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_budget() -> PollBudget {
    PollBudget::new(Duration::from_millis(20), Duration::from_secs(5))
}

async fn mock_platform() -> (MockServer, ProbeConfig) {
    init_test_tracing();
    let server = MockServer::start().await;
    let config = ProbeConfig::single_endpoint(&server.uri());
    (server, config)
}

fn server_body(status: &str, task_state: Option<&str>) -> serde_json::Value {
    json!({
        "id": "srv-1",
        "name": "probe-server",
        "status": status,
        "task_state": task_state,
    })
}

#[tokio::test]
async fn test_server_lifecycle_boot_to_teardown() {
    let (platform, config) = mock_platform().await;

    // =======================================================================
    // Step 1: Boot a server; the control plane reports BUILD immediately.
    // =======================================================================
    Mock::given(method("POST"))
        .and(path("/v1/servers"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(server_body("BUILD", Some("spawning"))),
        )
        .mount(&platform)
        .await;

    let status_script = ScriptedResponder::new(vec![
        ResponseTemplate::new(200).set_body_json(server_body("BUILD", Some("spawning"))),
        ResponseTemplate::new(200).set_body_json(server_body("BUILD", Some("spawning"))),
        ResponseTemplate::new(200).set_body_json(server_body("ACTIVE", None)),
        ResponseTemplate::new(200).set_body_json(server_body("ACTIVE", Some("deleting"))),
        ResponseTemplate::new(404),
    ]);
    Mock::given(method("GET"))
        .and(path("/v1/servers/srv-1"))
        .respond_with(status_script.clone())
        .mount(&platform)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/servers/srv-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&platform)
        .await;

    let compute = ComputeClient::new(&config).unwrap().with_budget(fast_budget());
    let mut servers = ResourceTracker::new("server");

    let server = compute
        .create_server(&CreateServerRequest {
            name: rand_name("e2e-server"),
            flavor: "small".to_string(),
            image: "img-base".to_string(),
        })
        .await
        .unwrap();
    servers.track(&server.id);
    assert_eq!(server.status, "BUILD");

    // =======================================================================
    // Step 2: Wait for ACTIVE through the BUILD transitions.
    // =======================================================================
    let snapshot = compute
        .wait_for_server_status(&server.id, "ACTIVE", WaitOptions::default())
        .await
        .unwrap();
    assert_eq!(snapshot.status, "ACTIVE");
    assert_eq!(status_script.polls(), 3);

    // =======================================================================
    // Step 3: Delete and wait for the server to vanish.
    // =======================================================================
    compute.delete_and_wait(&server.id).await.unwrap();
    servers.untrack(&server.id);
    assert!(servers.is_empty());

    // =======================================================================
    // Step 4: The teardown sweep tolerates resources that are already gone.
    // =======================================================================
    Mock::given(method("DELETE"))
        .and(path("/v1/servers/srv-ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&platform)
        .await;
    servers.track("srv-ghost");

    let report = servers
        .cleanup_all(|id| {
            let compute = compute.clone();
            async move { compute.delete_server(&id).await.map_err(AccessError::from) }
        })
        .await;

    assert!(report.is_clean());
    assert_eq!(report.already_gone, ["srv-ghost"]);
    assert!(servers.is_empty());
}

#[tokio::test]
async fn test_volume_and_snapshot_lifecycle() {
    let (platform, config) = mock_platform().await;

    Mock::given(method("POST"))
        .and(path("/v1/volumes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(
            json!({"id": "vol-1", "name": "e2e-volume", "status": "creating", "size_gb": 1}),
        ))
        .mount(&platform)
        .await;
    let volume_script = ScriptedResponder::new(vec![
        ResponseTemplate::new(200).set_body_json(json!({"status": "creating"})),
        ResponseTemplate::new(200).set_body_json(json!({"status": "available"})),
        ResponseTemplate::new(200).set_body_json(json!({"status": "deleting"})),
        ResponseTemplate::new(404),
    ]);
    Mock::given(method("GET"))
        .and(path("/v1/volumes/vol-1"))
        .respond_with(volume_script.clone())
        .mount(&platform)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/volumes/vol-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&platform)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/snapshots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(
            json!({"id": "snap-1", "volume_id": "vol-1", "name": "e2e-snap", "status": "creating"}),
        ))
        .mount(&platform)
        .await;
    let snapshot_script = ScriptedResponder::new(vec![
        ResponseTemplate::new(200).set_body_json(json!({"status": "creating"})),
        ResponseTemplate::new(200).set_body_json(json!({"status": "available"})),
        ResponseTemplate::new(404),
    ]);
    Mock::given(method("GET"))
        .and(path("/v1/snapshots/snap-1"))
        .respond_with(snapshot_script.clone())
        .mount(&platform)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/snapshots/snap-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&platform)
        .await;

    let volumes = VolumeClient::new(&config).unwrap().with_budget(fast_budget());

    // Volume builds, then a snapshot of it builds.
    let volume = volumes
        .create_volume(&CreateVolumeRequest {
            name: rand_name("e2e-volume"),
            size_gb: 1,
        })
        .await
        .unwrap();
    volumes
        .wait_for_volume_status(&volume.id, "available")
        .await
        .unwrap();

    let snapshot = volumes
        .create_snapshot(&CreateSnapshotRequest {
            volume_id: volume.id.clone(),
            name: rand_name("e2e-snap"),
        })
        .await
        .unwrap();
    volumes
        .wait_for_snapshot_status(&snapshot.id, "available")
        .await
        .unwrap();

    // Snapshot goes first, then the volume it came from.
    volumes.delete_snapshot(&snapshot.id).await.unwrap();
    volumes.wait_for_snapshot_deletion(&snapshot.id).await.unwrap();

    volumes.delete_volume(&volume.id).await.unwrap();
    volumes.wait_for_volume_deletion(&volume.id).await.unwrap();

    assert_eq!(volume_script.polls(), 4);
    assert_eq!(snapshot_script.polls(), 3);
}

#[tokio::test]
async fn test_alarm_and_samples_convergence() {
    let (platform, config) = mock_platform().await;

    Mock::given(method("POST"))
        .and(path("/v1/alarms"))
        .respond_with(ResponseTemplate::new(201).set_body_json(
            json!({"id": "alm-1", "name": "e2e-alarm", "state": "insufficient_data"}),
        ))
        .mount(&platform)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/alarms/alm-1/state"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "alm-1", "name": "e2e-alarm", "state": "alarm"})),
        )
        .mount(&platform)
        .await;
    let alarm_script = ScriptedResponder::json_states(vec![
        json!({"id": "alm-1", "name": "e2e-alarm", "state": "insufficient_data"}),
        json!({"id": "alm-1", "name": "e2e-alarm", "state": "alarm", "state_reason": "state set by probe"}),
    ]);
    Mock::given(method("GET"))
        .and(path("/v1/alarms/alm-1"))
        .respond_with(alarm_script)
        .mount(&platform)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/alarms/alm-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&platform)
        .await;

    let samples_script = ScriptedResponder::json_states(vec![
        json!({"items": []}),
        json!({"items": [{
            "resource_id": "srv-1",
            "meter": "cpu_util",
            "volume": 0.97,
            "timestamp": "2026-08-06T09:30:00Z",
        }]}),
    ]);
    Mock::given(method("GET"))
        .and(path("/v1/samples"))
        .respond_with(samples_script)
        .mount(&platform)
        .await;

    let telemetry = TelemetryClient::new(&config).unwrap().with_budget(fast_budget());
    let mut alarms = ResourceTracker::new("alarm");

    let alarm = telemetry
        .create_alarm(&CreateAlarmRequest {
            name: rand_name("e2e-alarm"),
            meter: "cpu_util".to_string(),
            threshold: 0.9,
            comparison: "gt".to_string(),
        })
        .await
        .unwrap();
    alarms.track(&alarm.id);
    assert_eq!(alarm.state, "insufficient_data");

    telemetry.set_alarm_state(&alarm.id, "alarm").await.unwrap();
    let snapshot = telemetry.wait_for_alarm_state(&alarm.id, "alarm").await.unwrap();
    assert_eq!(snapshot.status, "alarm");

    let samples = telemetry.await_samples("cpu_util", None).await.unwrap();
    assert!(!samples.is_empty());
    assert!(samples[0].volume > 0.9);

    let report = alarms
        .cleanup_all(|id| {
            let telemetry = telemetry.clone();
            async move { telemetry.delete_alarm(&id).await.map_err(AccessError::from) }
        })
        .await;
    assert!(report.is_clean());
    assert!(alarms.is_empty());
}
