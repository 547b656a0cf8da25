//! stackd Core Library
//!
//! Provisions application stacks on OpenStack-style clouds: security rules,
//! templated bootstrap scripts, instance creation, readiness watching and
//! callback delivery, driven by per-stack profiles.

pub mod actions;
pub mod callback;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod network;
pub mod observability;
pub mod orchestrator;
pub mod profiles;
pub mod provisioner;
pub mod rules;
pub mod saga;
pub mod secrets;
pub mod shutdown;
pub mod templates;
pub mod types;
pub mod watcher;

// Re-export commonly used items
pub use actions::InstanceAction;
pub use callback::{CallbackDispatcher, Delivery};
pub use capabilities::{
    AuditAction, AuditEntry, AuditLog, BlockStorage, CloudProvider, CloudSession, Compute,
    Networking,
};
pub use config::{AdminIdentity, Config};
pub use error::{ProvisionError, Result};
pub use observability::{init as init_observability, shutdown as shutdown_observability};
pub use orchestrator::{Orchestrator, ProvisionReceipt};
pub use profiles::{BootMode, ProfileRegistry, StackProfile};
pub use shutdown::shutdown_signal;
pub use templates::{BootstrapTemplate, TemplateLoader};
pub use types::{
    BootstrapScript, CallbackPayload, FlavorSelector, Instance, InstanceHandle, InstanceStatus,
    PortRule, ProvisionRequest, Requester, StackKind,
};
pub use watcher::{WatchOutcome, WatchPolicy, WatcherRegistry};
