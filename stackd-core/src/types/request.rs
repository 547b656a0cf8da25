//! Provision request types.

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Predefined application bundle provisioned as one cloud instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackKind {
    /// Database-backed service.
    GenericDb,
    /// Serverless runtime for Go functions.
    ServerlessGo,
    /// Serverless runtime for PHP functions.
    ServerlessPhp,
    /// Learning management system.
    Lms,
    /// Meeting server.
    Meeting,
    /// Generic application with caller-defined ports.
    GenericApp,
}

impl StackKind {
    /// All stack kinds, in declaration order.
    pub const ALL: [StackKind; 6] = [
        Self::GenericDb,
        Self::ServerlessGo,
        Self::ServerlessPhp,
        Self::Lms,
        Self::Meeting,
        Self::GenericApp,
    ];

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenericDb => "generic-db",
            Self::ServerlessGo => "serverless-go",
            Self::ServerlessPhp => "serverless-php",
            Self::Lms => "lms",
            Self::Meeting => "meeting",
            Self::GenericApp => "generic-app",
        }
    }

    /// Parse stack kind from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s.to_lowercase())
    }
}

impl std::fmt::Display for StackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of the caller on whose behalf a stack is provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// Cloud user id (used for audit records).
    pub user_id: String,

    /// Cloud username (used to scope capability sessions).
    pub username: String,

    /// Contact email, when known.
    #[serde(default)]
    pub email: Option<String>,
}

/// How the instance flavor is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlavorSelector {
    /// Use an existing flavor by id.
    Id(String),

    /// Find (or create) a flavor with exactly these dimensions.
    Spec { vcpus: u32, ram_mb: u32, disk_gb: u32 },
}

/// Extra ingress port supplied by the caller (generic-app stacks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRule {
    pub port: u16,

    /// Source CIDR; empty means the requester's allowed source.
    #[serde(default)]
    pub source: String,

    /// Rule description.
    #[serde(default)]
    pub label: String,
}

/// A request to provision one stack instance.
///
/// Created per call, consumed synchronously by the orchestrator and then
/// discarded. The orchestrator never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Caller-chosen request id, echoed in the callback payload.
    pub request_id: String,

    /// Stack type to provision.
    pub stack: StackKind,

    /// Instance name.
    pub name: String,

    /// Caller identity.
    pub requester: Requester,

    /// URL receiving the callback once the instance is reachable.
    pub callback_url: String,

    /// Allowed source for restricted ports: an IP address or a CIDR.
    pub allowed_ip: String,

    /// Flavor selection.
    pub flavor: FlavorSelector,

    /// Network to attach; resolved through the admin identity when absent.
    #[serde(default)]
    pub network_id: Option<String>,

    /// Image override; the configured default image is used when absent.
    #[serde(default)]
    pub image_id: Option<String>,

    /// Disk size override in GB.
    #[serde(default)]
    pub disk_gb: Option<u32>,

    /// Extra ingress ports (honoured only by profiles that accept them).
    #[serde(default)]
    pub ports: Vec<PortRule>,

    /// Template placeholder values supplied by the caller.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ProvisionRequest {
    /// Check the request before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.request_id.trim().is_empty() {
            return Err(invalid("request_id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name is required"));
        }

        let url = reqwest::Url::parse(&self.callback_url)
            .map_err(|e| invalid(format!("callback_url is not a valid URL: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid(format!("callback_url scheme {} is not http(s)", url.scheme())));
        }

        self.source_cidr()?;

        if let FlavorSelector::Spec { vcpus, ram_mb, disk_gb } = &self.flavor {
            if *vcpus == 0 || *ram_mb == 0 || *disk_gb == 0 {
                return Err(invalid("flavor spec values must be non-zero"));
            }
        }

        for port in &self.ports {
            if port.port == 0 {
                return Err(invalid("port 0 is not a valid ingress port"));
            }
            if !port.source.is_empty() {
                normalize_cidr(&port.source)?;
            }
        }

        Ok(())
    }

    /// The allowed source as a CIDR (`a.b.c.d` becomes `a.b.c.d/32`).
    pub fn source_cidr(&self) -> Result<String> {
        normalize_cidr(&self.allowed_ip)
    }
}

/// Normalize an IP address or CIDR into CIDR notation.
pub fn normalize_cidr(source: &str) -> Result<String> {
    let source = source.trim();
    let (addr, prefix) = match source.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (source, None),
    };

    let ip: IpAddr =
        addr.parse().map_err(|_| invalid(format!("{} is not an IP address or CIDR", source)))?;
    let max_prefix = if ip.is_ipv4() { 32 } else { 128 };

    match prefix {
        Some(prefix) => {
            let bits: u8 = prefix
                .parse()
                .ok()
                .filter(|bits| *bits <= max_prefix)
                .ok_or_else(|| invalid(format!("{} has an invalid prefix length", source)))?;
            Ok(format!("{}/{}", ip, bits))
        }
        None => Ok(format!("{}/{}", ip, max_prefix)),
    }
}

fn invalid(reason: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidRequest { reason: reason.into() }
}
