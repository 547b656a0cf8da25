//! Security rule configuration.
//!
//! Rules are only applied to the project's security group named exactly
//! `default`. A missing group means no rule is created and the request goes
//! on without one. Individual rule failures never abort provisioning; they
//! are reported back so the caller can audit them.

use crate::capabilities::Compute;
use crate::error::ProvisionError;
use crate::observability::metrics;
use crate::types::SecurityRuleSpec;
use tracing::{debug, instrument, warn};

/// Name of the security group rules are applied to.
pub const DEFAULT_GROUP: &str = "default";

/// What happened to one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStatus {
    Created { rule_id: String },
    /// The provider already holds an identical rule.
    AlreadyPresent,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub label: String,
    pub port_min: u16,
    pub port_max: u16,
    pub cidr: String,
    pub status: RuleStatus,
}

impl RuleOutcome {
    /// The failure as a non-fatal error, if the rule failed.
    pub fn error(&self) -> Option<ProvisionError> {
        match &self.status {
            RuleStatus::Failed { reason } => Some(ProvisionError::SecurityRule {
                label: self.label.clone(),
                port_min: self.port_min,
                port_max: self.port_max,
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

/// Result of applying a rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleReport {
    /// Id of the `default` group, when found.
    pub group_id: Option<String>,
    pub outcomes: Vec<RuleOutcome>,
}

impl RuleReport {
    /// Security group names to attach to the instance.
    pub fn security_groups(&self) -> Vec<String> {
        match self.group_id {
            Some(_) => vec![DEFAULT_GROUP.to_string()],
            None => Vec::new(),
        }
    }

    /// Ids of rules created by this request, in creation order.
    pub fn created(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            RuleStatus::Created { rule_id } => Some((rule_id.as_str(), outcome.label.as_str())),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| matches!(o.status, RuleStatus::Failed { .. }))
    }
}

/// Applies a stack's rule table to the `default` security group.
pub struct SecurityRuleConfigurator<'a> {
    compute: &'a dyn Compute,
}

impl<'a> SecurityRuleConfigurator<'a> {
    pub fn new(compute: &'a dyn Compute) -> Self {
        Self { compute }
    }

    /// Issue one create call per rule. No deduplication is attempted.
    #[instrument(skip(self, rules), fields(rules = rules.len()))]
    pub async fn apply(&self, rules: &[SecurityRuleSpec], requester_cidr: &str) -> RuleReport {
        let groups = match self.compute.list_security_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "Failed to list security groups, skipping rules");
                return RuleReport::default();
            }
        };

        let Some(group) = groups.into_iter().find(|g| g.name == DEFAULT_GROUP) else {
            warn!("No security group named {} found, skipping rules", DEFAULT_GROUP);
            return RuleReport::default();
        };

        let mut outcomes = Vec::with_capacity(rules.len());
        for spec in rules {
            let rule = spec.resolve(&group.id, requester_cidr);
            let status = match self.compute.create_ingress_rule(&rule).await {
                Ok(rule_id) => {
                    metrics::record_security_rule("created");
                    debug!(label = %rule.label, port = rule.port_min, cidr = %rule.cidr, "Created ingress rule");
                    RuleStatus::Created { rule_id }
                }
                Err(ProvisionError::Conflict { .. }) => {
                    metrics::record_security_rule("already_present");
                    debug!(label = %rule.label, port = rule.port_min, "Ingress rule already present");
                    RuleStatus::AlreadyPresent
                }
                Err(e) => {
                    metrics::record_security_rule("failed");
                    warn!(label = %rule.label, port = rule.port_min, error = %e, "Failed to create ingress rule");
                    RuleStatus::Failed { reason: e.to_string() }
                }
            };
            outcomes.push(RuleOutcome {
                label: rule.label,
                port_min: rule.port_min,
                port_max: rule.port_max,
                cidr: rule.cidr,
                status,
            });
        }

        RuleReport { group_id: Some(group.id), outcomes }
    }
}
