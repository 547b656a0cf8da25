//! Instance domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cloud instance as reported by the compute capability.
///
/// Owned by the provider; the orchestrator only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Provider instance identifier
    pub id: String,

    /// Instance name
    pub name: String,

    /// Current provider status
    pub status: InstanceStatus,

    /// Addresses keyed by network label
    #[serde(default)]
    pub addresses: HashMap<String, Vec<InstanceAddress>>,

    /// Attached volume ids
    #[serde(default)]
    pub attached_volumes: Vec<String>,
}

/// Provider instance status.
///
/// Only `ACTIVE` and `ERROR` are terminal; every other provider value is a
/// transient state and keeps the readiness watcher polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    Building,
    Active,
    Error,
    Other(String),
}

impl InstanceStatus {
    /// Parse a provider status string. Matching is exact.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "BUILD" | "BUILDING" => Self::Building,
            "ACTIVE" => Self::Active,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Error)
    }
}

impl From<String> for InstanceStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Building => write!(f, "BUILDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Error => write!(f, "ERROR"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One address assigned to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAddress {
    pub addr: String,
    #[serde(default)]
    pub version: Option<u8>,
}

impl InstanceAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), version: None }
    }
}

/// Handle returned to the caller right after instance creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub id: String,
    pub name: String,
    pub status: InstanceStatus,
}

impl From<&Instance> for InstanceHandle {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id.clone(),
            name: instance.name.clone(),
            status: instance.status.clone(),
        }
    }
}

/// Rendered first-boot script. Contents are never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BootstrapScript(Vec<u8>);

impl BootstrapScript {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 view, for operator tooling.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl std::fmt::Debug for BootstrapScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BootstrapScript(<{} bytes>)", self.0.len())
    }
}

/// Parameters of an instance-creation call.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub name: String,
    /// Image id, or the boot volume id when booting from a volume
    pub image_id: String,
    pub flavor_id: String,
    pub keypair: Option<String>,
    pub disk_gb: u32,
    pub security_groups: Vec<String>,
    pub user_data: BootstrapScript,
    pub availability_zone: String,
    pub config_drive: bool,
    /// Empty means provider default
    pub network_id: String,
}
