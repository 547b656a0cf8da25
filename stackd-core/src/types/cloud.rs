//! Provider-side resource types: security groups, flavors, volumes.

use serde::{Deserialize, Serialize};

/// Security group visible to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
}

/// Traffic direction of a security rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingress => write!(f, "ingress"),
            Self::Egress => write!(f, "egress"),
        }
    }
}

/// Transport protocol of a security rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Where a rule admits traffic from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// The requester's allowed source CIDR
    Requester,
    /// `0.0.0.0/0`
    Anywhere,
    /// A fixed CIDR
    Cidr(String),
}

/// Rule template attached to a stack profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRuleSpec {
    pub direction: Direction,
    pub protocol: Protocol,
    pub port_min: u16,
    pub port_max: u16,
    pub source: RuleSource,
    pub label: String,
}

impl SecurityRuleSpec {
    /// TCP ingress on a single port.
    pub fn tcp(port: u16, source: RuleSource, label: impl Into<String>) -> Self {
        Self {
            direction: Direction::Ingress,
            protocol: Protocol::Tcp,
            port_min: port,
            port_max: port,
            source,
            label: label.into(),
        }
    }

    /// Resolve the source into a concrete rule for a security group.
    pub fn resolve(&self, group_id: &str, requester_cidr: &str) -> IngressRule {
        let cidr = match &self.source {
            RuleSource::Requester => requester_cidr.to_string(),
            RuleSource::Anywhere => ANYWHERE.to_string(),
            RuleSource::Cidr(cidr) => cidr.clone(),
        };
        IngressRule {
            security_group_id: group_id.to_string(),
            direction: self.direction,
            protocol: self.protocol,
            port_min: self.port_min,
            port_max: self.port_max,
            cidr,
            label: self.label.clone(),
        }
    }
}

/// CIDR admitting every IPv4 source.
pub const ANYWHERE: &str = "0.0.0.0/0";

/// Concrete rule sent to the compute capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub security_group_id: String,
    pub direction: Direction,
    pub protocol: Protocol,
    pub port_min: u16,
    pub port_max: u16,
    pub cidr: String,
    pub label: String,
}

/// Instance flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub vcpus: u32,
    pub ram_mb: u32,
    pub disk_gb: u32,
}

impl Flavor {
    pub fn matches(&self, vcpus: u32, ram_mb: u32, disk_gb: u32) -> bool {
        self.vcpus == vcpus && self.ram_mb == ram_mb && self.disk_gb == disk_gb
    }
}

/// Flavor listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlavorFilter {
    /// Keep only flavors whose name contains this substring
    pub name_contains: Option<String>,
}

/// Parameters of a flavor-creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorSpec {
    pub name: String,
    pub vcpus: u32,
    pub ram_mb: u32,
    pub disk_gb: u32,
    pub public: bool,
}

/// Block-storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    /// Provider status (`creating`, `available`, `error`, ...)
    pub status: String,
    pub size_gb: u32,
}

impl Volume {
    pub fn is_available(&self) -> bool {
        self.status.eq_ignore_ascii_case("available")
    }

    pub fn is_failed(&self) -> bool {
        self.status.to_ascii_lowercase().starts_with("error")
    }
}

/// Parameters of a volume-from-image call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub name: String,
    pub image_id: String,
    pub size_gb: u32,
    pub volume_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_resolution() {
        let restricted = SecurityRuleSpec::tcp(5432, RuleSource::Requester, "psql");
        let rule = restricted.resolve("sg-1", "203.0.113.7/32");
        assert_eq!(rule.cidr, "203.0.113.7/32");
        assert_eq!(rule.security_group_id, "sg-1");
        assert_eq!((rule.port_min, rule.port_max), (5432, 5432));

        let public = SecurityRuleSpec::tcp(443, RuleSource::Anywhere, "https");
        assert_eq!(public.resolve("sg-1", "203.0.113.7/32").cidr, ANYWHERE);
    }

    #[test]
    fn test_volume_status() {
        let mut volume = Volume {
            id: "v-1".to_string(),
            name: "boot".to_string(),
            status: "Available".to_string(),
            size_gb: 30,
        };
        assert!(volume.is_available());
        volume.status = "error_restoring".to_string();
        assert!(volume.is_failed());
        volume.status = "creating".to_string();
        assert!(!volume.is_available() && !volume.is_failed());
    }
}
