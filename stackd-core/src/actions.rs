//! Instance lifecycle actions.

use crate::capabilities::{AuditAction, Compute};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Power action on an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceAction {
    Start,
    Stop,
    /// Hard reboot.
    Reboot,
}

impl InstanceAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reboot => "reboot",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "reboot" => Some(Self::Reboot),
            _ => None,
        }
    }

    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Start => AuditAction::Start,
            Self::Stop => AuditAction::Stop,
            Self::Reboot => AuditAction::Reboot,
        }
    }

    /// Issue the action through the compute capability.
    pub async fn apply(&self, compute: &dyn Compute, instance_id: &str) -> Result<()> {
        match self {
            Self::Start => compute.start_instance(instance_id).await,
            Self::Stop => compute.stop_instance(instance_id).await,
            Self::Reboot => compute.reboot_instance(instance_id).await,
        }
    }
}

impl std::fmt::Display for InstanceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
