//! Readiness watching.
//!
//! One detached task per created instance polls the compute capability until
//! the instance is `ACTIVE` or `ERROR`, then delivers the callback at most
//! once. Watchers are bounded by a [`WatchPolicy`] and can be cancelled
//! through the [`WatcherRegistry`] that spawned them.

use crate::callback::CallbackDispatcher;
use crate::capabilities::{AuditAction, AuditEntry, AuditLog, Compute};
use crate::config::WatchSettings;
use crate::error::ProvisionError;
use crate::observability::metrics;
use crate::profiles::PayloadPlan;
use crate::types::{Instance, InstanceStatus, Requester};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Bounds on how long a watcher polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPolicy {
    pub interval: Duration,
    /// Maximum status fetches; unbounded when `None`.
    pub max_attempts: Option<u32>,
    /// Overall time budget; unbounded when `None`.
    pub deadline: Option<Duration>,
}

impl From<&WatchSettings> for WatchPolicy {
    fn from(settings: &WatchSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.poll_interval_ms),
            max_attempts: settings.max_attempts,
            deadline: settings.deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Classification of a polled status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Failed,
    Pending,
}

/// Only exact `ACTIVE` and `ERROR` are terminal.
pub fn classify(status: &InstanceStatus) -> Readiness {
    match status {
        InstanceStatus::Active => Readiness::Ready,
        InstanceStatus::Error => Readiness::Failed,
        _ => Readiness::Pending,
    }
}

/// Address of an active instance.
///
/// Labels are checked in order; the first label holding at least one
/// address wins and its last listed address is returned.
pub fn extract_address(instance: &Instance, labels: &[String]) -> Option<String> {
    labels
        .iter()
        .filter_map(|label| instance.addresses.get(label))
        .find_map(|addresses| addresses.last())
        .map(|address| address.addr.clone())
}

/// Terminal state of a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Instance became active and the callback was sent.
    Delivered { address: String, acknowledged: bool },
    /// Instance reached `ERROR`; no callback.
    Failed,
    /// Policy exhausted; no callback.
    TimedOut { attempts: u32 },
    /// Stopped through the registry; no callback.
    Cancelled,
}

impl WatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Failed => "failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Everything one watcher needs about the instance it follows.
#[derive(Debug, Clone)]
pub struct WatchTask {
    pub request_id: String,
    pub instance_id: String,
    /// Audit label (instance name)
    pub label: String,
    pub resource_type: String,
    pub requester: Requester,
    pub callback_url: String,
    pub address_labels: Vec<String>,
    pub payload: PayloadPlan,
}

/// Shared polling machinery used by every spawned watcher.
pub struct ReadinessWatcher {
    compute: Arc<dyn Compute>,
    audit: Arc<dyn AuditLog>,
    dispatcher: CallbackDispatcher,
    policy: WatchPolicy,
}

impl ReadinessWatcher {
    pub fn new(
        compute: Arc<dyn Compute>,
        audit: Arc<dyn AuditLog>,
        dispatcher: CallbackDispatcher,
        policy: WatchPolicy,
    ) -> Self {
        Self { compute, audit, dispatcher, policy }
    }

    /// Poll until a terminal outcome. Records a metric for the outcome.
    #[instrument(
        skip(self, task, cancel),
        fields(request_id = %task.request_id, instance_id = %task.instance_id)
    )]
    pub async fn run(&self, task: &WatchTask, mut cancel: broadcast::Receiver<()>) -> WatchOutcome {
        let outcome = self.poll(task, &mut cancel).await;
        metrics::watcher_finished(outcome.as_str());
        info!(outcome = outcome.as_str(), "Readiness watcher finished");
        outcome
    }

    async fn poll(&self, task: &WatchTask, cancel: &mut broadcast::Receiver<()>) -> WatchOutcome {
        let deadline_at = self.policy.deadline.map(|deadline| Instant::now() + deadline);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let fetched = tokio::select! {
                fetched = self.compute.get_instance(&task.instance_id) => fetched,
                _ = cancellation(cancel) => return self.cancelled(task).await,
                _ = expiry(deadline_at) => return self.timed_out(task, attempts).await,
            };

            match fetched {
                Ok(instance) => match classify(&instance.status) {
                    Readiness::Ready => return self.deliver(task, &instance).await,
                    Readiness::Failed => return self.failed(task).await,
                    Readiness::Pending => {
                        debug!(attempt = attempts, status = %instance.status, "Instance not ready")
                    }
                },
                // Fetch errors are not terminal; the attempt still counts.
                Err(e) => warn!(attempt = attempts, error = %e, "Failed to fetch instance status"),
            }

            if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                return self.timed_out(task, attempts).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval) => {}
                _ = cancellation(cancel) => return self.cancelled(task).await,
                _ = expiry(deadline_at) => return self.timed_out(task, attempts).await,
            }
        }
    }

    async fn deliver(&self, task: &WatchTask, instance: &Instance) -> WatchOutcome {
        let address = extract_address(instance, &task.address_labels).unwrap_or_else(|| {
            warn!(labels = ?task.address_labels, "Active instance has no address on known labels");
            String::new()
        });

        let payload = task.payload.build(instance, &address);
        info!(address = %address, "Instance active, sending callback");
        let acknowledged = self.dispatcher.deliver(&task.callback_url, &payload).await;

        if !acknowledged {
            let reason = format!("callback to {} was not acknowledged", task.callback_url);
            self.record(task, AuditAction::CallbackFailed, Some(reason)).await;
        }

        WatchOutcome::Delivered { address, acknowledged }
    }

    async fn failed(&self, task: &WatchTask) -> WatchOutcome {
        let err = ProvisionError::ReadinessFailure {
            instance_id: task.instance_id.clone(),
        };
        error!(error = %err, "Instance failed to become ready");
        self.record(task, AuditAction::ReadinessFailed, Some(err.to_string())).await;
        WatchOutcome::Failed
    }

    async fn timed_out(&self, task: &WatchTask, attempts: u32) -> WatchOutcome {
        warn!(attempts, policy = ?self.policy, "Readiness watch timed out");
        let reason = format!("instance not ready after {} status checks", attempts);
        self.record(task, AuditAction::TimedOut, Some(reason)).await;
        WatchOutcome::TimedOut { attempts }
    }

    async fn cancelled(&self, task: &WatchTask) -> WatchOutcome {
        info!("Readiness watcher cancelled");
        self.record(task, AuditAction::Cancelled, None).await;
        WatchOutcome::Cancelled
    }

    async fn record(&self, task: &WatchTask, action: AuditAction, error: Option<String>) {
        let entry = AuditEntry::new(
            &task.instance_id,
            &task.resource_type,
            &task.label,
            action,
            &task.requester,
        )
        .with_error(error);
        if let Err(e) = self.audit.record_action(&entry).await {
            warn!(action = %action, error = %e, "Failed to record audit entry");
        }
    }
}

/// Resolves when a cancellation is sent. A closed channel never resolves,
/// so dropping the registry does not stop detached watchers.
async fn cancellation(rx: &mut broadcast::Receiver<()>) {
    match rx.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}

/// Resolves once the deadline passes. Never resolves without one.
async fn expiry(deadline_at: Option<Instant>) {
    match deadline_at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

struct WatcherEntry {
    instance_id: String,
    cancel: broadcast::Sender<()>,
    handle: JoinHandle<WatchOutcome>,
}

/// Tracks spawned watchers so they can be cancelled and awaited.
#[derive(Clone, Default)]
pub struct WatcherRegistry {
    watchers: Arc<Mutex<HashMap<String, WatcherEntry>>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a detached watcher and return its id.
    pub async fn spawn(&self, watcher: Arc<ReadinessWatcher>, task: WatchTask) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let (cancel, cancel_rx) = broadcast::channel(1);
        let instance_id = task.instance_id.clone();

        metrics::watcher_started();
        let handle = tokio::spawn(async move { watcher.run(&task, cancel_rx).await });

        let mut watchers = self.watchers.lock().await;
        watchers.retain(|_, entry| !entry.handle.is_finished());
        watchers.insert(id.clone(), WatcherEntry { instance_id, cancel, handle });
        debug!(watcher_id = %id, "Spawned readiness watcher");
        id
    }

    /// Ask one watcher to stop. Returns false if it is unknown or finished.
    pub async fn cancel(&self, id: &str) -> bool {
        let watchers = self.watchers.lock().await;
        match watchers.get(id) {
            Some(entry) if !entry.handle.is_finished() => entry.cancel.send(()).is_ok(),
            _ => false,
        }
    }

    /// Ask every running watcher to stop. Returns how many were signalled.
    pub async fn cancel_all(&self) -> usize {
        let watchers = self.watchers.lock().await;
        watchers
            .values()
            .filter(|entry| !entry.handle.is_finished())
            .filter(|entry| entry.cancel.send(()).is_ok())
            .count()
    }

    /// Watchers still polling.
    pub async fn active_count(&self) -> usize {
        self.watchers.lock().await.values().filter(|e| !e.handle.is_finished()).count()
    }

    /// Instance followed by a watcher.
    pub async fn instance_of(&self, id: &str) -> Option<String> {
        self.watchers.lock().await.get(id).map(|entry| entry.instance_id.clone())
    }

    /// Wait for one watcher and take its outcome.
    pub async fn join(&self, id: &str) -> Option<WatchOutcome> {
        let entry = self.watchers.lock().await.remove(id)?;
        match entry.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(watcher_id = %id, error = %e, "Readiness watcher task failed");
                None
            }
        }
    }

    /// Cancel every watcher and wait up to `grace` for them to finish.
    /// Watchers still running afterwards are aborted. Returns how many
    /// finished within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let signalled = self.cancel_all().await;
        let entries: Vec<(String, WatcherEntry)> = self.watchers.lock().await.drain().collect();
        info!(signalled, tracked = entries.len(), "Stopping readiness watchers");

        let deadline = Instant::now() + grace;
        let mut finished = 0;
        for (id, entry) in entries {
            let mut handle = entry.handle;
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => finished += 1,
                Err(_) => {
                    warn!(watcher_id = %id, "Watcher did not stop within grace period, aborting");
                    handle.abort();
                    metrics::watcher_finished("aborted");
                }
            }
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstanceAddress;

    fn instance(addresses: &[(&str, &[&str])]) -> Instance {
        Instance {
            id: "i-1".to_string(),
            name: "db-1".to_string(),
            status: InstanceStatus::Active,
            addresses: addresses
                .iter()
                .map(|(label, addrs)| {
                    (label.to_string(), addrs.iter().map(|a| InstanceAddress::new(*a)).collect())
                })
                .collect(),
            attached_volumes: vec![],
        }
    }

    fn labels(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_classify_exact_statuses() {
        assert_eq!(classify(&InstanceStatus::parse("ACTIVE")), Readiness::Ready);
        assert_eq!(classify(&InstanceStatus::parse("ERROR")), Readiness::Failed);
        for other in ["BUILD", "BUILDING", "active", "error", "SHUTOFF", "REBOOT", ""] {
            assert_eq!(classify(&InstanceStatus::parse(other)), Readiness::Pending, "{}", other);
        }
    }

    #[test]
    fn test_extract_address_single_label() {
        let instance = instance(&[("public1", &["10.0.0.5"])]);
        assert_eq!(
            extract_address(&instance, &labels(&["public1", "public2"])),
            Some("10.0.0.5".to_string())
        );
    }

    #[test]
    fn test_extract_address_fallback_and_order() {
        let single = instance(&[("public2", &["10.0.1.1", "10.0.1.2"])]);
        assert_eq!(
            extract_address(&single, &labels(&["public1", "public2"])),
            Some("10.0.1.2".to_string())
        );

        let both = instance(&[("public1", &["10.0.0.5"]), ("public2", &["10.0.1.1"])]);
        assert_eq!(
            extract_address(&both, &labels(&["public1", "public2"])),
            Some("10.0.0.5".to_string())
        );

        let empty_first = instance(&[("public-1", &[]), ("public-2", &["10.2.0.9"])]);
        assert_eq!(
            extract_address(&empty_first, &labels(&["public-1", "public-2"])),
            Some("10.2.0.9".to_string())
        );
    }

    #[test]
    fn test_extract_address_unknown_label() {
        let instance = instance(&[("private", &["192.168.0.2"])]);
        assert_eq!(extract_address(&instance, &labels(&["public1", "public2"])), None);
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = WatchPolicy::from(&WatchSettings::default());
        assert_eq!(policy.interval, Duration::from_secs(3));
        assert_eq!(policy.max_attempts, Some(600));
        assert_eq!(policy.deadline, None);
    }
}
