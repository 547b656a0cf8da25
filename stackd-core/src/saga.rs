//! Compensation log for a provisioning request.
//!
//! Every remote side effect performed before the instance exists is recorded
//! as a [`Compensation`]. When a later fatal step fails, the recorded steps are
//! undone in reverse order. Undo is best-effort: failures are logged, counted
//! and audited, and never replace the error that triggered the rollback.

use crate::capabilities::{AuditAction, AuditEntry, AuditLog, CloudSession};
use crate::error::ProvisionError;
use crate::observability::metrics;
use crate::types::Requester;
use tracing::{info, warn};

/// Which identity owns a compensated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Requester,
    Admin,
}

/// Undo action for one completed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    DeleteSecurityRule { rule_id: String, label: String },
    DeleteFlavor { flavor_id: String, scope: Scope },
    DeleteVolume { volume_id: String },
}

impl Compensation {
    /// Step name (metric label).
    pub fn step(&self) -> &'static str {
        match self {
            Self::DeleteSecurityRule { .. } => "security_rule",
            Self::DeleteFlavor { .. } => "flavor",
            Self::DeleteVolume { .. } => "volume",
        }
    }

    fn resource(&self) -> (&str, &'static str) {
        match self {
            Self::DeleteSecurityRule { rule_id, .. } => (rule_id, "SecurityRule"),
            Self::DeleteFlavor { flavor_id, .. } => (flavor_id, "Flavor"),
            Self::DeleteVolume { volume_id } => (volume_id, "Volume"),
        }
    }
}

/// Result of a rollback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub undone: usize,
    pub failed: usize,
}

/// Ordered record of completed reversible steps.
#[derive(Debug, Default)]
pub struct Saga {
    request_id: String,
    steps: Vec<Compensation>,
    admin: Option<CloudSession>,
}

impl Saga {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), steps: Vec::new(), admin: None }
    }

    /// Session used to undo [`Scope::Admin`] steps.
    pub fn set_admin_session(&mut self, admin: CloudSession) {
        self.admin = Some(admin);
    }

    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Compensation] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undo every recorded step, newest first.
    pub async fn compensate(
        &self,
        session: &CloudSession,
        audit: &dyn AuditLog,
        requester: &Requester,
    ) -> CompensationReport {
        let mut report = CompensationReport::default();
        if self.steps.is_empty() {
            return report;
        }

        info!(request_id = %self.request_id, steps = self.steps.len(), "Rolling back provisioning steps");

        for step in self.steps.iter().rev() {
            let result = match step {
                Compensation::DeleteSecurityRule { rule_id, .. } => {
                    session.compute.delete_security_rule(rule_id).await
                }
                Compensation::DeleteFlavor { flavor_id, scope } => {
                    let target = match scope {
                        Scope::Requester => Some(session),
                        Scope::Admin => self.admin.as_ref(),
                    };
                    match target {
                        Some(target) => target.compute.delete_flavor(flavor_id).await,
                        None => Err(ProvisionError::Internal(
                            "no admin session for flavor cleanup".to_string(),
                        )),
                    }
                }
                Compensation::DeleteVolume { volume_id } => {
                    session.block_storage.delete_volume(volume_id).await
                }
            };

            let (resource_id, resource_type) = step.resource();
            let error = match result {
                Ok(()) => {
                    report.undone += 1;
                    metrics::record_compensation(step.step(), "undone");
                    None
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::record_compensation(step.step(), "failed");
                    warn!(
                        request_id = %self.request_id,
                        step = step.step(),
                        resource_id,
                        error = %e,
                        "Compensation step failed"
                    );
                    Some(e.to_string())
                }
            };

            let entry = AuditEntry::new(
                resource_id,
                resource_type,
                &self.request_id,
                AuditAction::Compensated,
                requester,
            )
            .with_error(error);
            if let Err(e) = audit.record_action(&entry).await {
                warn!(request_id = %self.request_id, error = %e, "Failed to audit compensation");
            }
        }

        report
    }
}
