//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    // Provisioning
    describe_counter!(
        "stackd_provision_requests_total",
        "Total provisioning requests (by stack, outcome)"
    );
    describe_histogram!(
        "stackd_provision_duration_seconds",
        "Time from request acceptance to instance handle (by stack)"
    );
    describe_counter!(
        "stackd_security_rules_total",
        "Ingress rule create calls (by outcome: created, already_present, failed)"
    );
    describe_counter!(
        "stackd_compensations_total",
        "Compensation steps executed after a failed request (by step, outcome)"
    );

    // Readiness watchers
    describe_gauge!("stackd_watchers_active", "Readiness watchers currently polling");
    describe_counter!(
        "stackd_watch_outcomes_total",
        "Terminal watcher outcomes (by outcome: delivered, failed, timed_out, cancelled, aborted)"
    );
    describe_counter!(
        "stackd_callbacks_total",
        "Callback deliveries (by outcome: acknowledged, rejected, error)"
    );

    // Instance actions
    describe_counter!(
        "stackd_instance_actions_total",
        "Start/stop/reboot actions (by action, outcome)"
    );
}

pub fn record_provision(stack: &str, outcome: &str, duration_secs: f64) {
    counter!(
        "stackd_provision_requests_total",
        "stack" => stack.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("stackd_provision_duration_seconds", "stack" => stack.to_string())
        .record(duration_secs);
}

pub fn record_security_rule(outcome: &str) {
    counter!("stackd_security_rules_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_compensation(step: &str, outcome: &str) {
    counter!(
        "stackd_compensations_total",
        "step" => step.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn watcher_started() {
    gauge!("stackd_watchers_active").increment(1.0);
}

pub fn watcher_finished(outcome: &str) {
    gauge!("stackd_watchers_active").decrement(1.0);
    counter!("stackd_watch_outcomes_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_callback(outcome: &str) {
    counter!("stackd_callbacks_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_instance_action(action: &str, outcome: &str) {
    counter!(
        "stackd_instance_actions_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
