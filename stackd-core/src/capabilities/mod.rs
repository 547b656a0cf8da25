//! Cloud capability abstraction.
//!
//! The orchestrator never talks to a provider SDK directly. Compute,
//! block-storage, networking and audit integrations implement the traits
//! below; a [`CloudProvider`] hands out sessions scoped to one identity.
//! Methods are instrumented by implementations (not here).

use crate::config::AdminIdentity;
use crate::error::Result;
use crate::types::{
    Flavor, FlavorFilter, FlavorSpec, IngressRule, Instance, InstanceSpec, Requester,
    SecurityGroup, Volume, VolumeSpec,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Compute capability (security groups, instances, flavors).
#[async_trait]
pub trait Compute: Send + Sync {
    /// List security groups visible to the session identity.
    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>>;

    /// Create one ingress rule and return its id.
    ///
    /// A rule identical to an existing one is reported as
    /// [`ProvisionError::Conflict`](crate::error::ProvisionError::Conflict).
    async fn create_ingress_rule(&self, rule: &IngressRule) -> Result<String>;

    /// Delete a security rule by id.
    async fn delete_security_rule(&self, rule_id: &str) -> Result<()>;

    /// Boot an instance from an image.
    async fn create_instance(&self, spec: &InstanceSpec) -> Result<Instance>;

    /// Boot an instance from an existing volume (`spec.image_id` is the volume id).
    async fn create_instance_from_volume(&self, spec: &InstanceSpec) -> Result<Instance>;

    /// Fetch current instance state.
    async fn get_instance(&self, instance_id: &str) -> Result<Instance>;

    async fn start_instance(&self, instance_id: &str) -> Result<()>;

    async fn stop_instance(&self, instance_id: &str) -> Result<()>;

    /// Hard reboot.
    async fn reboot_instance(&self, instance_id: &str) -> Result<()>;

    async fn get_flavor(&self, flavor_id: &str) -> Result<Flavor>;

    async fn list_flavors(&self, filter: &FlavorFilter) -> Result<Vec<Flavor>>;

    async fn create_flavor(&self, spec: &FlavorSpec) -> Result<Flavor>;

    async fn delete_flavor(&self, flavor_id: &str) -> Result<()>;

    /// Capability name (for logging/metrics).
    fn name(&self) -> &str;
}

/// Block-storage capability.
#[async_trait]
pub trait BlockStorage: Send + Sync {
    async fn create_volume_from_image(&self, spec: &VolumeSpec) -> Result<Volume>;

    async fn get_volume(&self, volume_id: &str) -> Result<Volume>;

    async fn delete_volume(&self, volume_id: &str) -> Result<()>;
}

/// Networking capability.
#[async_trait]
pub trait Networking: Send + Sync {
    /// Authenticate as `admin` and return the first available network id.
    async fn resolve_available_network(&self, admin: &AdminIdentity) -> Result<String>;
}

/// Audit capability. Persistence is the implementation's concern.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record one action and return the log entry id.
    async fn record_action(&self, entry: &AuditEntry) -> Result<i64>;
}

/// Session factory scoped to one identity.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Session acting on behalf of a requester.
    async fn session(&self, requester: &Requester) -> Result<CloudSession>;

    /// Session acting as the administrative identity.
    async fn admin_session(&self, admin: &AdminIdentity) -> Result<CloudSession>;
}

/// Capabilities bound to one identity.
#[derive(Clone)]
pub struct CloudSession {
    pub compute: Arc<dyn Compute>,
    pub block_storage: Arc<dyn BlockStorage>,
}

impl std::fmt::Debug for CloudSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSession").field("compute", &self.compute.name()).finish_non_exhaustive()
    }
}

/// Audited action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Create,
    Start,
    Stop,
    Reboot,
    ReadinessFailed,
    TimedOut,
    Cancelled,
    CallbackFailed,
    Compensated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Start => "Start",
            Self::Stop => "Stop",
            Self::Reboot => "Reboot",
            Self::ReadinessFailed => "ReadinessFailed",
            Self::TimedOut => "TimedOut",
            Self::Cancelled => "Cancelled",
            Self::CallbackFailed => "CallbackFailed",
            Self::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub resource_id: String,
    pub resource_type: String,
    pub label: String,
    pub action: AuditAction,
    pub requester: Requester,
    /// Error text, when the action failed
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn new(
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        label: impl Into<String>,
        action: AuditAction,
        requester: &Requester,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
            label: label.into(),
            action,
            requester: requester.clone(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }
}
