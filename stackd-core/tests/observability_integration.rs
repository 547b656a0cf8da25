//! Integration tests for metrics emission.
//!
//! Metrics are captured with a local Prometheus recorder, so no scrape
//! endpoint or global recorder is needed.

mod common;

use common::{config, orchestrator, request, template_dir, MockCloud};
use metrics_exporter_prometheus::PrometheusBuilder;
use stackd_core::observability::metrics::*;
use stackd_core::types::StackKind;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[test]
fn test_provision_metrics_are_rendered() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        register_core_metrics();
        record_provision("generic-db", "created", 0.42);
        record_provision("generic-db", "template_unavailable", 0.01);
        record_security_rule("created");
        record_security_rule("failed");
        record_compensation("security_rule", "undone");
    });

    let output = handle.render();
    assert!(output.contains("stackd_provision_requests_total{"));
    assert!(output.contains("outcome=\"created\""));
    assert!(output.contains("outcome=\"template_unavailable\""));
    assert!(output.contains("stackd_provision_duration_seconds"));
    assert!(output.contains("stackd_security_rules_total{outcome=\"failed\"} 1"));
    assert!(output.contains("step=\"security_rule\""));
}

#[test]
fn test_watcher_gauge_tracks_active_watchers() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        watcher_started();
        watcher_started();
        watcher_finished("delivered");
        record_callback("acknowledged");
    });

    let output = handle.render();
    assert!(output.contains("stackd_watchers_active 1"));
    assert!(output.contains("stackd_watch_outcomes_total{outcome=\"delivered\"} 1"));
    assert!(output.contains("stackd_callbacks_total{outcome=\"acknowledged\"} 1"));
}

#[tokio::test]
async fn test_aborted_watchers_leave_the_active_gauge() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let cloud = MockCloud::new();
    cloud.stall_status_fetch.store(true, Ordering::SeqCst);
    let templates = template_dir();
    let orch = orchestrator(&cloud, config(templates.path()));

    orch.provision(&request(StackKind::GenericDb, "http://127.0.0.1:1/test")).await.unwrap();
    // The cancellation audit write never completes, so shutdown has to abort.
    cloud.stall_audit.store(true, Ordering::SeqCst);

    let stopped = orch.shutdown(Duration::from_millis(50)).await;
    assert_eq!(stopped, 0);

    let output = handle.render();
    assert!(output.contains("stackd_watchers_active 0"));
    assert!(output.contains("stackd_watch_outcomes_total{outcome=\"aborted\"} 1"));
}
