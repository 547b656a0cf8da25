//! Stack profiles.
//!
//! A profile is the per-stack configuration value object driving the one
//! generic provisioning workflow: which ingress rules to open, which template
//! to render, which secrets to generate, how to boot, where to look for the
//! instance address and what to send back in the callback.
//!
//! # Example
//!
//! ```ignore
//! use stackd_core::profiles::ProfileRegistry;
//! use stackd_core::types::StackKind;
//!
//! let registry = ProfileRegistry::new();
//! let profile = registry.get(StackKind::Lms)?;
//! println!("Template: {}", profile.template_id);
//! ```

mod builtin;

use crate::error::{ProvisionError, Result};
use crate::secrets::{SecretSet, SecretSpec};
use crate::types::{
    normalize_cidr, CallbackPayload, Instance, PortRule, ProvisionRequest, RuleSource,
    SecurityRuleSpec, StackKind, ANYWHERE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub use builtin::BUILTIN_PROFILES;

/// How the instance root disk is provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootMode {
    /// Boot directly from the image.
    Image,
    /// Pre-create a volume of this type from the image and boot from it.
    Volume { volume_type: String },
}

impl std::fmt::Display for BootMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Volume { volume_type } => write!(f, "volume ({})", volume_type),
        }
    }
}

/// Where a callback payload value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Literal(String),
    /// A generated secret, by placeholder name
    Secret(String),
    /// A request parameter, by name
    Param(String),
    RequestId,
    InstanceId,
    InstanceName,
    /// The address extracted when the instance became active
    Address,
}

/// One key of the callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub key: String,
    pub source: ValueSource,
}

/// Everything needed to build the callback payload once the instance is
/// active. Owned by the readiness watcher.
#[derive(Debug, Clone)]
pub struct PayloadPlan {
    request_id: String,
    fields: Vec<PayloadField>,
    secrets: SecretSet,
    params: BTreeMap<String, String>,
}

impl PayloadPlan {
    pub fn new(
        request_id: impl Into<String>,
        fields: Vec<PayloadField>,
        secrets: SecretSet,
        params: BTreeMap<String, String>,
    ) -> Self {
        Self { request_id: request_id.into(), fields, secrets, params }
    }

    /// Build the payload. Missing secrets or params yield empty strings.
    pub fn build(&self, instance: &Instance, address: &str) -> CallbackPayload {
        let mut payload = CallbackPayload::new(&self.request_id);
        for field in &self.fields {
            let value = match &field.source {
                ValueSource::Literal(value) => value.clone(),
                ValueSource::Secret(token) => {
                    self.secrets.get(token).unwrap_or_default().to_string()
                }
                ValueSource::Param(name) => self.params.get(name).cloned().unwrap_or_default(),
                ValueSource::RequestId => self.request_id.clone(),
                ValueSource::InstanceId => instance.id.clone(),
                ValueSource::InstanceName => instance.name.clone(),
                ValueSource::Address => address.to_string(),
            };
            payload.fields.insert(field.key.clone(), value);
        }
        payload
    }
}

/// Per-stack provisioning profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackProfile {
    pub kind: StackKind,

    /// Human-readable name (e.g., "Generic database").
    pub name: String,

    /// Template path relative to the template directory.
    pub template_id: String,

    /// Fixed ingress rules.
    pub rules: Vec<SecurityRuleSpec>,

    /// Whether request-supplied ports become ingress rules.
    pub accepts_request_ports: bool,

    /// Secrets generated per request.
    pub secrets: Vec<SecretSpec>,

    pub boot_mode: BootMode,

    pub default_disk_gb: u32,

    /// Network labels checked, in order, for the instance address.
    pub address_labels: Vec<String>,

    /// Substring selecting this stack's flavors by name.
    pub flavor_family: String,

    /// Resource type written to audit records.
    pub resource_type: String,

    /// Callback payload shape.
    pub payload: Vec<PayloadField>,
}

impl StackProfile {
    /// Create a new profile builder.
    #[must_use]
    pub fn builder(kind: StackKind) -> ProfileBuilder {
        ProfileBuilder::new(kind)
    }

    /// Ingress rules for a request: the fixed table followed by any
    /// request-supplied ports this profile accepts.
    pub fn rules_for(&self, request: &ProvisionRequest) -> Result<Vec<SecurityRuleSpec>> {
        self.rules_with_ports(&request.ports)
    }

    /// Fixed rules plus `ports`, when this profile accepts extra ports.
    pub fn rules_with_ports(&self, ports: &[PortRule]) -> Result<Vec<SecurityRuleSpec>> {
        let mut rules = self.rules.clone();
        if !self.accepts_request_ports {
            return Ok(rules);
        }

        for port in ports {
            let source = match port.source.trim() {
                "" => RuleSource::Requester,
                ANYWHERE => RuleSource::Anywhere,
                cidr => RuleSource::Cidr(normalize_cidr(cidr)?),
            };
            let label = if port.label.is_empty() {
                format!("port-{}", port.port)
            } else {
                port.label.clone()
            };
            rules.push(SecurityRuleSpec::tcp(port.port, source, label));
        }
        Ok(rules)
    }

    /// Payload plan for one request.
    pub fn payload_plan(&self, request: &ProvisionRequest, secrets: SecretSet) -> PayloadPlan {
        PayloadPlan::new(&request.request_id, self.payload.clone(), secrets, request.params.clone())
    }
}

/// Builder for creating profiles.
#[derive(Debug)]
pub struct ProfileBuilder {
    profile: StackProfile,
}

impl ProfileBuilder {
    pub fn new(kind: StackKind) -> Self {
        Self {
            profile: StackProfile {
                kind,
                name: kind.as_str().to_string(),
                template_id: format!("{}/base.yml", kind.as_str()),
                rules: Vec::new(),
                accepts_request_ports: false,
                secrets: Vec::new(),
                boot_mode: BootMode::Image,
                default_disk_gb: 30,
                address_labels: vec!["public1".to_string(), "public2".to_string()],
                flavor_family: String::new(),
                resource_type: kind.as_str().to_string(),
                payload: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.profile.name = name.into();
        self
    }

    pub fn template(mut self, template_id: impl Into<String>) -> Self {
        self.profile.template_id = template_id.into();
        self
    }

    /// Open a port to the requester's allowed source.
    pub fn restricted_port(mut self, port: u16, label: impl Into<String>) -> Self {
        self.profile.rules.push(SecurityRuleSpec::tcp(port, RuleSource::Requester, label));
        self
    }

    /// Open a port to everyone.
    pub fn public_port(mut self, port: u16, label: impl Into<String>) -> Self {
        self.profile.rules.push(SecurityRuleSpec::tcp(port, RuleSource::Anywhere, label));
        self
    }

    pub fn request_ports(mut self) -> Self {
        self.profile.accepts_request_ports = true;
        self
    }

    pub fn secret(mut self, token: impl Into<String>, len: usize) -> Self {
        self.profile.secrets.push(SecretSpec::new(token, len));
        self
    }

    pub fn prefixed_secret(
        mut self,
        token: impl Into<String>,
        prefix: impl Into<String>,
        len: usize,
    ) -> Self {
        self.profile.secrets.push(SecretSpec::new(token, len).with_prefix(prefix));
        self
    }

    pub fn boot_from_volume(mut self, volume_type: impl Into<String>) -> Self {
        self.profile.boot_mode = BootMode::Volume { volume_type: volume_type.into() };
        self
    }

    pub fn disk(mut self, disk_gb: u32) -> Self {
        self.profile.default_disk_gb = disk_gb;
        self
    }

    pub fn address_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profile.address_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn flavor_family(mut self, family: impl Into<String>) -> Self {
        self.profile.flavor_family = family.into();
        self
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.profile.resource_type = resource_type.into();
        self
    }

    /// Add a payload key.
    pub fn field(mut self, key: impl Into<String>, source: ValueSource) -> Self {
        self.profile.payload.push(PayloadField { key: key.into(), source });
        self
    }

    #[must_use]
    pub fn build(self) -> StackProfile {
        self.profile
    }
}

/// Registry of stack profiles.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<StackKind, StackProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRegistry {
    /// Create a registry with the built-in profiles.
    #[must_use]
    pub fn new() -> Self {
        let profiles =
            BUILTIN_PROFILES.iter().map(|profile| (profile.kind, profile.clone())).collect();
        Self { profiles }
    }

    /// Create an empty registry (for testing).
    #[must_use]
    pub fn empty() -> Self {
        Self { profiles: HashMap::new() }
    }

    /// Register a profile, replacing any profile for the same stack.
    pub fn register(&mut self, profile: StackProfile) {
        self.profiles.insert(profile.kind, profile);
    }

    pub fn get(&self, kind: StackKind) -> Result<&StackProfile> {
        self.profiles
            .get(&kind)
            .ok_or_else(|| ProvisionError::UnknownStack { stack: kind.to_string() })
    }

    /// All profiles, in stack order.
    #[must_use]
    pub fn list(&self) -> Vec<&StackProfile> {
        let mut profiles: Vec<&StackProfile> = self.profiles.values().collect();
        profiles.sort_by_key(|profile| profile.kind);
        profiles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
