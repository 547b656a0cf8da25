//! Error types for stackd.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stackd operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Main error type for stackd.
#[derive(Error, Debug)]
pub enum ProvisionError {
    // Local preparation errors (raised before any remote call)
    #[error("Bootstrap template unavailable: {template}: {reason}")]
    TemplateUnavailable { template: String, reason: String },

    #[error("Invalid provision request: {reason}")]
    InvalidRequest { reason: String },

    #[error("No profile registered for stack: {stack}")]
    UnknownStack { stack: String },

    // Remote preparation errors
    #[error("Security rule {label} ({port_min}-{port_max}) failed: {reason}")]
    SecurityRule { label: String, port_min: u16, port_max: u16, reason: String },

    #[error("Network resolution failed: {reason}")]
    NetworkResolution { reason: String },

    #[error("Flavor resolution failed: {reason}")]
    FlavorResolution { reason: String },

    #[error("Volume {volume_id} did not become available: {reason}")]
    VolumeNotReady { volume_id: String, reason: String },

    #[error("Instance creation failed for {name}: {reason}")]
    Provisioner { name: String, reason: String },

    // Post-creation errors (never reach the original caller)
    #[error("Instance {instance_id} reached ERROR state")]
    ReadinessFailure { instance_id: String },

    #[error("Callback to {url} was not acknowledged: {reason}")]
    CallbackDelivery { url: String, reason: String },

    // Capability errors
    #[error("{capability} call {operation} failed: {reason}")]
    Capability { capability: String, operation: String, reason: String },

    #[error("{capability} reported a conflict for {operation}: {reason}")]
    Conflict { capability: String, operation: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProvisionError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Shorthand for a failed capability call.
    pub fn capability(
        capability: impl Into<String>,
        operation: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Capability {
            capability: capability.into(),
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts a provisioning request.
    ///
    /// Security-rule and network-resolution failures degrade the request instead
    /// of aborting it; errors found after instance creation are never surfaced
    /// synchronously and are reported as non-fatal here.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::SecurityRule { .. }
                | Self::NetworkResolution { .. }
                | Self::ReadinessFailure { .. }
                | Self::CallbackDelivery { .. }
                | Self::Conflict { .. }
        )
    }

    /// Short machine-readable kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TemplateUnavailable { .. } => "template_unavailable",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnknownStack { .. } => "unknown_stack",
            Self::SecurityRule { .. } => "security_rule",
            Self::NetworkResolution { .. } => "network_resolution",
            Self::FlavorResolution { .. } => "flavor_resolution",
            Self::VolumeNotReady { .. } => "volume_not_ready",
            Self::Provisioner { .. } => "provisioner",
            Self::ReadinessFailure { .. } => "readiness_failure",
            Self::CallbackDelivery { .. } => "callback_delivery",
            Self::Capability { .. } => "capability",
            Self::Conflict { .. } => "conflict",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Io { .. } => "io",
            Self::Internal(_) => "internal",
            Self::Other(_) => "other",
        }
    }
}
