//! Stack provisioning orchestration.
//!
//! One parameterized workflow serves every stack type:
//! validate → load template → security rules → network → flavor → render →
//! create instance → (return receipt) → readiness watch → callback.
//!
//! Steps up to instance creation run inside the caller's request. Failures
//! there are returned to the caller after recorded side effects are rolled
//! back. Everything after instance creation runs in a detached watcher and is
//! only observable through logs, metrics and the audit capability.

use crate::actions::InstanceAction;
use crate::callback::CallbackDispatcher;
use crate::capabilities::{AuditAction, AuditEntry, AuditLog, CloudProvider, CloudSession, Networking};
use crate::config::Config;
use crate::error::{ProvisionError, Result};
use crate::network::NetworkResolver;
use crate::observability::metrics;
use crate::profiles::{ProfileRegistry, StackProfile};
use crate::provisioner::{resolve_flavor, InstanceProvisioner, VolumeWaitPolicy};
use crate::rules::{RuleReport, SecurityRuleConfigurator};
use crate::saga::{Compensation, Saga};
use crate::secrets::SecretSet;
use crate::templates::{BootstrapTemplate, TemplateLoader, TemplateValues};
use crate::types::{
    Flavor, FlavorFilter, FlavorSelector, Instance, InstanceHandle, InstanceSpec, ProvisionRequest,
    Requester, StackKind,
};
use crate::watcher::{ReadinessWatcher, WatchPolicy, WatchTask, WatcherRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Synchronous result of a provisioning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReceipt {
    pub request_id: String,
    pub stack: StackKind,
    pub instance: InstanceHandle,
    /// Id of the readiness watcher following the instance.
    pub watcher_id: String,
    /// Audit entry of the create action, when it could be recorded.
    pub audit_log_id: Option<i64>,
}

/// Everything prepared locally before the first remote call.
struct Prepared<'a> {
    profile: &'a StackProfile,
    template: BootstrapTemplate,
    secrets: SecretSet,
    requester_cidr: String,
    image_id: String,
}

/// Stack provisioning orchestrator.
pub struct Orchestrator {
    config: Arc<Config>,
    provider: Arc<dyn CloudProvider>,
    networking: Arc<dyn Networking>,
    audit: Arc<dyn AuditLog>,
    profiles: ProfileRegistry,
    templates: TemplateLoader,
    dispatcher: CallbackDispatcher,
    watchers: WatcherRegistry,
}

impl Orchestrator {
    /// Create an orchestrator with the built-in stack profiles.
    pub fn new(
        config: Config,
        provider: Arc<dyn CloudProvider>,
        networking: Arc<dyn Networking>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self> {
        config.validate()?;
        let dispatcher = CallbackDispatcher::new(config.callback_timeout())?;
        let templates = TemplateLoader::new(config.template_dir.clone());

        Ok(Self {
            config: Arc::new(config),
            provider,
            networking,
            audit,
            profiles: ProfileRegistry::new(),
            templates,
            dispatcher,
            watchers: WatcherRegistry::new(),
        })
    }

    /// Replace the profile registry.
    #[must_use]
    pub fn with_profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Provision one stack instance.
    ///
    /// Returns as soon as the instance exists. Readiness and the callback are
    /// handled by a detached watcher whose id is in the receipt.
    #[instrument(skip(self, request), fields(request_id = %request.request_id, stack = %request.stack))]
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<ProvisionReceipt> {
        let started = Instant::now();
        info!(name = %request.name, "Provisioning stack");

        let result = self.provision_inner(request).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(receipt) => {
                metrics::record_provision(request.stack.as_str(), "created", elapsed);
                info!(
                    instance_id = %receipt.instance.id,
                    watcher_id = %receipt.watcher_id,
                    "Instance created, readiness watcher started"
                );
            }
            Err(e) => {
                metrics::record_provision(request.stack.as_str(), e.kind(), elapsed);
                error!(error = %e, "Provisioning failed");
            }
        }
        result
    }

    async fn provision_inner(&self, request: &ProvisionRequest) -> Result<ProvisionReceipt> {
        let prepared = self.prepare(request)?;
        let profile = prepared.profile;

        let session = self.provider.session(&request.requester).await?;
        let mut saga = Saga::new(&request.request_id);

        let rules = profile.rules_for(request)?;
        let report = SecurityRuleConfigurator::new(session.compute.as_ref())
            .apply(&rules, &prepared.requester_cidr)
            .await;
        for (rule_id, label) in report.created() {
            saga.record(Compensation::DeleteSecurityRule {
                rule_id: rule_id.to_string(),
                label: label.to_string(),
            });
        }
        self.audit_rule_failures(request, &report).await;

        let instance = match self.create_instance(request, &prepared, &session, &report, &mut saga).await {
            Ok(instance) => instance,
            Err(e) => {
                warn!(error = %e, steps = saga.len(), "Instance creation failed, compensating");
                let outcome =
                    saga.compensate(&session, self.audit.as_ref(), &request.requester).await;
                if outcome.failed > 0 {
                    warn!(undone = outcome.undone, failed = outcome.failed, "Compensation incomplete");
                }
                return Err(e);
            }
        };

        let audit_log_id = self
            .record(AuditEntry::new(
                &instance.id,
                &profile.resource_type,
                &instance.name,
                AuditAction::Create,
                &request.requester,
            ))
            .await;

        let watcher = Arc::new(ReadinessWatcher::new(
            session.compute.clone(),
            self.audit.clone(),
            self.dispatcher.clone(),
            WatchPolicy::from(&self.config.watch),
        ));
        let task = WatchTask {
            request_id: request.request_id.clone(),
            instance_id: instance.id.clone(),
            label: instance.name.clone(),
            resource_type: profile.resource_type.clone(),
            requester: request.requester.clone(),
            callback_url: request.callback_url.clone(),
            address_labels: profile.address_labels.clone(),
            payload: profile.payload_plan(request, prepared.secrets),
        };
        let watcher_id = self.watchers.spawn(watcher, task).await;

        Ok(ProvisionReceipt {
            request_id: request.request_id.clone(),
            stack: request.stack,
            instance: InstanceHandle::from(&instance),
            watcher_id,
            audit_log_id,
        })
    }

    /// Local checks and template loading. Nothing remote is touched here.
    fn prepare(&self, request: &ProvisionRequest) -> Result<Prepared<'_>> {
        request.validate()?;
        let profile = self.profiles.get(request.stack)?;
        let requester_cidr = request.source_cidr()?;

        let image_id = request
            .image_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.config.default_image_id.clone());
        if image_id.is_empty() {
            return Err(ProvisionError::InvalidRequest {
                reason: "no image_id on request and no default image configured".to_string(),
            });
        }

        let template = self.templates.load(&profile.template_id)?;
        let secrets = SecretSet::generate(&profile.secrets);
        debug!(template = %template.id(), secrets = ?secrets, "Prepared request");

        Ok(Prepared { profile, template, secrets, requester_cidr, image_id })
    }

    async fn create_instance(
        &self,
        request: &ProvisionRequest,
        prepared: &Prepared<'_>,
        session: &CloudSession,
        report: &RuleReport,
        saga: &mut Saga,
    ) -> Result<Instance> {
        let profile = prepared.profile;

        let network_id = NetworkResolver::new(self.networking.clone(), self.config.admin.clone())
            .resolve(request.network_id.as_deref())
            .await;

        let admin = match &request.flavor {
            FlavorSelector::Spec { .. } => {
                match self.provider.admin_session(&self.config.admin).await {
                    Ok(admin) => Some(admin),
                    Err(e) => {
                        warn!(error = %e, "Admin session unavailable, creating flavor as requester");
                        None
                    }
                }
            }
            FlavorSelector::Id(_) => None,
        };
        let flavor = resolve_flavor(
            &request.flavor,
            &request.request_id,
            request.stack.as_str(),
            session,
            admin,
            saga,
        )
        .await?;
        let disk_gb = flavor.disk_gb.or(request.disk_gb).unwrap_or(profile.default_disk_gb);

        let values = template_values(request, &prepared.secrets, &network_id);
        let rendered = prepared.template.render(&values);
        if !rendered.unresolved.is_empty() {
            warn!(
                template = %prepared.template.id(),
                unresolved = ?rendered.unresolved,
                "Bootstrap template has unmapped placeholders"
            );
        }

        let spec = InstanceSpec {
            name: request.name.clone(),
            image_id: prepared.image_id.clone(),
            flavor_id: flavor.id,
            keypair: self.config.keypair.clone(),
            disk_gb,
            security_groups: report.security_groups(),
            user_data: rendered.script,
            availability_zone: self.config.availability_zone.clone(),
            config_drive: self.config.config_drive,
            network_id,
        };

        InstanceProvisioner::new(session, VolumeWaitPolicy::from(&self.config.volume))
            .provision(&profile.boot_mode, spec, saga)
            .await
    }

    async fn audit_rule_failures(&self, request: &ProvisionRequest, report: &RuleReport) {
        let group_id = report.group_id.clone().unwrap_or_default();
        for failure in report.failures() {
            let error = failure.error().map(|e| e.to_string());
            self.record(
                AuditEntry::new(
                    &group_id,
                    "SecurityRule",
                    &failure.label,
                    AuditAction::Create,
                    &request.requester,
                )
                .with_error(error),
            )
            .await;
        }
    }

    /// Flavors visible to the requester whose name contains the stack's
    /// flavor family.
    #[instrument(skip(self, requester), fields(user = %requester.username))]
    pub async fn list_flavors(&self, requester: &Requester, stack: StackKind) -> Result<Vec<Flavor>> {
        let profile = self.profiles.get(stack)?;
        let session = self.provider.session(requester).await?;
        let filter = FlavorFilter { name_contains: Some(profile.flavor_family.clone()) };

        let flavors = session.compute.list_flavors(&filter).await?;
        Ok(flavors.into_iter().filter(|f| f.name.contains(&profile.flavor_family)).collect())
    }

    /// Start, stop or hard-reboot an instance and audit the action.
    #[instrument(skip(self, requester), fields(user = %requester.username))]
    pub async fn perform_action(
        &self,
        requester: &Requester,
        instance_id: &str,
        action: InstanceAction,
    ) -> Result<()> {
        let session = self.provider.session(requester).await?;

        let label = match session.compute.get_instance(instance_id).await {
            Ok(instance) => instance.name,
            Err(e) => {
                debug!(error = %e, "Could not resolve instance name for audit label");
                instance_id.to_string()
            }
        };

        let result = action.apply(session.compute.as_ref(), instance_id).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::record_instance_action(action.as_str(), outcome);

        let error = result.as_ref().err().map(ToString::to_string);
        self.record(
            AuditEntry::new(instance_id, "Instance", &label, action.audit_action(), requester)
                .with_error(error),
        )
        .await;

        match &result {
            Ok(()) => info!(action = %action, "Instance action completed"),
            Err(e) => warn!(action = %action, error = %e, "Instance action failed"),
        }
        result
    }

    /// Cancel every readiness watcher and wait up to `grace` for them.
    /// Returns how many watchers stopped within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.watchers.shutdown(grace).await
    }

    async fn record(&self, entry: AuditEntry) -> Option<i64> {
        match self.audit.record_action(&entry).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(action = %entry.action, resource_id = %entry.resource_id, error = %e, "Failed to record audit entry");
                None
            }
        }
    }
}

/// Placeholder values: request parameters, then computed values, then
/// generated secrets. Later sources win.
fn template_values(request: &ProvisionRequest, secrets: &SecretSet, network_id: &str) -> TemplateValues {
    let mut values: TemplateValues = request.params.clone();
    values.insert("REQUEST_ID".to_string(), request.request_id.clone());
    values.insert("INSTANCE_NAME".to_string(), request.name.clone());
    values.insert("STACK".to_string(), request.stack.as_str().to_string());
    values.insert("NETWORK_ID".to_string(), network_id.to_string());
    for (token, value) in secrets.iter() {
        values.insert(token.to_string(), value.to_string());
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretSpec;
    use crate::types::Requester;
    use std::collections::BTreeMap;

    #[test]
    fn test_template_values_precedence() {
        let request = ProvisionRequest {
            request_id: "req-1".to_string(),
            stack: StackKind::Lms,
            name: "lms-1".to_string(),
            requester: Requester {
                user_id: "u-1".to_string(),
                username: "alice".to_string(),
                email: None,
            },
            callback_url: "http://cb/test".to_string(),
            allowed_ip: "203.0.113.7".to_string(),
            flavor: FlavorSelector::Id("f-1".to_string()),
            network_id: None,
            image_id: None,
            disk_gb: None,
            ports: vec![],
            params: BTreeMap::from([
                ("DOMAIN".to_string(), "lms.example.org".to_string()),
                ("DB_PASSWORD".to_string(), "caller-chosen".to_string()),
            ]),
        };
        let secrets = SecretSet::generate(&[SecretSpec::new("DB_PASSWORD", 10)]);

        let values = template_values(&request, &secrets, "net-1");
        assert_eq!(values["DOMAIN"], "lms.example.org");
        assert_eq!(values["NETWORK_ID"], "net-1");
        assert_eq!(values["INSTANCE_NAME"], "lms-1");
        assert_eq!(Some(values["DB_PASSWORD"].as_str()), secrets.get("DB_PASSWORD"));
    }
}
