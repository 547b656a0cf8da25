//! Core domain types for stackd.

pub mod cloud;
pub mod instance;
pub mod payload;
pub mod request;

// Re-exports
pub use cloud::{
    Direction, Flavor, FlavorFilter, FlavorSpec, IngressRule, Protocol, RuleSource,
    SecurityGroup, SecurityRuleSpec, Volume, VolumeSpec, ANYWHERE,
};
pub use instance::{
    BootstrapScript, Instance, InstanceAddress, InstanceHandle, InstanceSpec, InstanceStatus,
};
pub use payload::CallbackPayload;
pub use request::{
    normalize_cidr, FlavorSelector, PortRule, ProvisionRequest, Requester, StackKind,
};
