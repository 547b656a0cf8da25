//! Shared mock cloud for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use stackd_core::capabilities::{
    AuditAction, AuditEntry, AuditLog, BlockStorage, CloudProvider, CloudSession, Compute,
    Networking,
};
use stackd_core::config::{AdminIdentity, Config};
use stackd_core::error::{ProvisionError, Result};
use stackd_core::types::{
    Flavor, FlavorFilter, FlavorSelector, FlavorSpec, IngressRule, Instance, InstanceAddress,
    InstanceSpec, InstanceStatus, ProvisionRequest, Requester, SecurityGroup, StackKind, Volume,
    VolumeSpec,
};
use stackd_core::Orchestrator;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Status value that makes `get_instance` fail instead of answering.
pub const FETCH_ERROR: &str = "FETCH_ERROR";

/// In-memory cloud with scripted instance and volume states.
pub struct MockCloud {
    pub security_groups: Mutex<Vec<SecurityGroup>>,
    pub rule_calls: Mutex<Vec<IngressRule>>,
    pub failing_ports: Mutex<HashSet<u16>>,
    pub conflicting_ports: Mutex<HashSet<u16>>,
    pub instance_statuses: Mutex<VecDeque<String>>,
    pub addresses: Mutex<HashMap<String, Vec<InstanceAddress>>>,
    pub create_instance_error: Mutex<Option<String>>,
    pub created_instances: Mutex<Vec<InstanceSpec>>,
    pub volume_booted_instances: Mutex<Vec<InstanceSpec>>,
    pub get_instance_calls: AtomicUsize,
    /// `get_instance` never answers while set.
    pub stall_status_fetch: AtomicBool,
    pub flavors: Mutex<Vec<Flavor>>,
    pub created_flavors: Mutex<Vec<FlavorSpec>>,
    pub volume_statuses: Mutex<VecDeque<String>>,
    pub created_volumes: Mutex<Vec<VolumeSpec>>,
    pub network: Mutex<std::result::Result<String, String>>,
    pub audit: Mutex<Vec<AuditEntry>>,
    /// `record_action` never answers while set.
    pub stall_audit: AtomicBool,
    pub actions: Mutex<Vec<(String, String)>>,
    pub failing_actions: Mutex<HashSet<String>>,
    /// Every undo call, in order (`rule:<id>`, `flavor:<id>`, `volume:<id>`).
    pub undo_log: Mutex<Vec<String>>,
    pub sessions: AtomicUsize,
    pub admin_sessions: AtomicUsize,
}

impl MockCloud {
    /// A project with a `default` group whose instance goes
    /// BUILDING → BUILDING → ACTIVE on `public1` = 10.0.0.5.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            security_groups: Mutex::new(vec![
                SecurityGroup { id: "sg-web".to_string(), name: "web".to_string() },
                SecurityGroup { id: "sg-1".to_string(), name: "default".to_string() },
            ]),
            rule_calls: Mutex::new(Vec::new()),
            failing_ports: Mutex::new(HashSet::new()),
            conflicting_ports: Mutex::new(HashSet::new()),
            instance_statuses: Mutex::new(
                ["BUILDING", "BUILDING", "ACTIVE"].iter().map(|s| s.to_string()).collect(),
            ),
            addresses: Mutex::new(HashMap::from([(
                "public1".to_string(),
                vec![InstanceAddress::new("10.0.0.5")],
            )])),
            create_instance_error: Mutex::new(None),
            created_instances: Mutex::new(Vec::new()),
            volume_booted_instances: Mutex::new(Vec::new()),
            get_instance_calls: AtomicUsize::new(0),
            stall_status_fetch: AtomicBool::new(false),
            flavors: Mutex::new(vec![
                flavor("f-small", "Lambda.small", 1, 1024, 10),
                flavor("f-medium", "IFinance.medium", 2, 4096, 30),
                flavor("f-large", "cloud.large", 4, 8192, 80),
            ]),
            created_flavors: Mutex::new(Vec::new()),
            volume_statuses: Mutex::new(
                ["creating", "available"].iter().map(|s| s.to_string()).collect(),
            ),
            created_volumes: Mutex::new(Vec::new()),
            network: Mutex::new(Ok("net-public".to_string())),
            audit: Mutex::new(Vec::new()),
            stall_audit: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
            failing_actions: Mutex::new(HashSet::new()),
            undo_log: Mutex::new(Vec::new()),
            sessions: AtomicUsize::new(0),
            admin_sessions: AtomicUsize::new(0),
        })
    }

    pub fn script_statuses(&self, statuses: &[&str]) {
        *self.instance_statuses.lock().unwrap() = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn script_volume(&self, statuses: &[&str]) {
        *self.volume_statuses.lock().unwrap() = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_addresses(&self, label: &str, addrs: &[&str]) {
        let mut addresses = self.addresses.lock().unwrap();
        addresses.clear();
        addresses
            .insert(label.to_string(), addrs.iter().map(|a| InstanceAddress::new(*a)).collect());
    }

    pub fn audit_actions(&self) -> Vec<AuditAction> {
        self.audit.lock().unwrap().iter().map(|e| e.action).collect()
    }

    pub fn rule_call_count(&self) -> usize {
        self.rule_calls.lock().unwrap().len()
    }

    pub fn undo_log(&self) -> Vec<String> {
        self.undo_log.lock().unwrap().clone()
    }

    fn instance(&self, id: &str, name: &str, status: InstanceStatus) -> Instance {
        Instance {
            id: id.to_string(),
            name: name.to_string(),
            status,
            addresses: self.addresses.lock().unwrap().clone(),
            attached_volumes: vec![],
        }
    }

    fn next_status(&self) -> String {
        let mut statuses = self.instance_statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or_default()
        } else {
            statuses.front().cloned().unwrap_or_default()
        }
    }

    fn create(&self, spec: &InstanceSpec) -> Result<Instance> {
        if let Some(reason) = self.create_instance_error.lock().unwrap().clone() {
            return Err(ProvisionError::capability("compute", "create_instance", reason));
        }
        Ok(self.instance("i-1", &spec.name, InstanceStatus::Building))
    }
}

pub fn flavor(id: &str, name: &str, vcpus: u32, ram_mb: u32, disk_gb: u32) -> Flavor {
    Flavor { id: id.to_string(), name: name.to_string(), vcpus, ram_mb, disk_gb }
}

#[async_trait]
impl Compute for MockCloud {
    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        Ok(self.security_groups.lock().unwrap().clone())
    }

    async fn create_ingress_rule(&self, rule: &IngressRule) -> Result<String> {
        let mut calls = self.rule_calls.lock().unwrap();
        calls.push(rule.clone());
        if self.failing_ports.lock().unwrap().contains(&rule.port_min) {
            return Err(ProvisionError::capability("compute", "create_ingress_rule", "forbidden"));
        }
        if self.conflicting_ports.lock().unwrap().contains(&rule.port_min) {
            return Err(ProvisionError::Conflict {
                capability: "compute".to_string(),
                operation: "create_ingress_rule".to_string(),
                reason: "rule already exists".to_string(),
            });
        }
        Ok(format!("rule-{}", calls.len()))
    }

    async fn delete_security_rule(&self, rule_id: &str) -> Result<()> {
        self.undo_log.lock().unwrap().push(format!("rule:{}", rule_id));
        Ok(())
    }

    async fn create_instance(&self, spec: &InstanceSpec) -> Result<Instance> {
        self.created_instances.lock().unwrap().push(spec.clone());
        self.create(spec)
    }

    async fn create_instance_from_volume(&self, spec: &InstanceSpec) -> Result<Instance> {
        self.volume_booted_instances.lock().unwrap().push(spec.clone());
        self.create(spec)
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Instance> {
        self.get_instance_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_status_fetch.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let status = self.next_status();
        if status == FETCH_ERROR {
            return Err(ProvisionError::capability("compute", "get_instance", "gateway timeout"));
        }
        Ok(self.instance(instance_id, "db-1", InstanceStatus::parse(&status)))
    }

    async fn start_instance(&self, instance_id: &str) -> Result<()> {
        self.action("start", instance_id)
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        self.action("stop", instance_id)
    }

    async fn reboot_instance(&self, instance_id: &str) -> Result<()> {
        self.action("reboot", instance_id)
    }

    async fn get_flavor(&self, flavor_id: &str) -> Result<Flavor> {
        self.flavors
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == flavor_id)
            .cloned()
            .ok_or_else(|| ProvisionError::capability("compute", "get_flavor", "not found"))
    }

    async fn list_flavors(&self, _filter: &FlavorFilter) -> Result<Vec<Flavor>> {
        // Ignores the filter like providers that do not support name filtering.
        Ok(self.flavors.lock().unwrap().clone())
    }

    async fn create_flavor(&self, spec: &FlavorSpec) -> Result<Flavor> {
        self.created_flavors.lock().unwrap().push(spec.clone());
        Ok(flavor("f-created", &spec.name, spec.vcpus, spec.ram_mb, spec.disk_gb))
    }

    async fn delete_flavor(&self, flavor_id: &str) -> Result<()> {
        self.undo_log.lock().unwrap().push(format!("flavor:{}", flavor_id));
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl MockCloud {
    fn action(&self, action: &str, instance_id: &str) -> Result<()> {
        self.actions.lock().unwrap().push((action.to_string(), instance_id.to_string()));
        if self.failing_actions.lock().unwrap().contains(action) {
            return Err(ProvisionError::capability("compute", action, "conflict: task_state"));
        }
        Ok(())
    }
}

#[async_trait]
impl BlockStorage for MockCloud {
    async fn create_volume_from_image(&self, spec: &VolumeSpec) -> Result<Volume> {
        self.created_volumes.lock().unwrap().push(spec.clone());
        Ok(Volume {
            id: "vol-1".to_string(),
            name: spec.name.clone(),
            status: "creating".to_string(),
            size_gb: spec.size_gb,
        })
    }

    async fn get_volume(&self, volume_id: &str) -> Result<Volume> {
        let mut statuses = self.volume_statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap_or_default()
        } else {
            statuses.front().cloned().unwrap_or_default()
        };
        Ok(Volume {
            id: volume_id.to_string(),
            name: "boot".to_string(),
            status,
            size_gb: 30,
        })
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        self.undo_log.lock().unwrap().push(format!("volume:{}", volume_id));
        Ok(())
    }
}

#[async_trait]
impl Networking for MockCloud {
    async fn resolve_available_network(&self, _admin: &AdminIdentity) -> Result<String> {
        self.network
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| ProvisionError::capability("networking", "authenticate", reason))
    }
}

#[async_trait]
impl AuditLog for MockCloud {
    async fn record_action(&self, entry: &AuditEntry) -> Result<i64> {
        if self.stall_audit.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut audit = self.audit.lock().unwrap();
        audit.push(entry.clone());
        Ok(audit.len() as i64)
    }
}

/// Hands out sessions backed by one [`MockCloud`].
pub struct MockProvider {
    pub cloud: Arc<MockCloud>,
}

impl MockProvider {
    fn bind(&self) -> CloudSession {
        CloudSession { compute: self.cloud.clone(), block_storage: self.cloud.clone() }
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn session(&self, _requester: &Requester) -> Result<CloudSession> {
        self.cloud.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(self.bind())
    }

    async fn admin_session(&self, _admin: &AdminIdentity) -> Result<CloudSession> {
        self.cloud.admin_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(self.bind())
    }
}

/// Template directory with one template per stack.
pub fn template_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let templates = [
        (
            "generic-db",
            "#cloud-config\nusers:\n  - name: {SSH_USER}\n    passwd: {SSH_PASSWORD}\nruncmd:\n  - setup-db {DB_NAME} {DB_USER} {DB_PASSWORD} {DB_ROOT_PASSWORD}\n",
        ),
        ("serverless-go", "db={DB_NAME} user={DB_USER} pass={DB_PASSWORD}\n"),
        ("serverless-php", "db={DB_NAME} user={DB_USER} pass={DB_PASSWORD}\n"),
        ("lms", "pw={DB_PASSWORD} domain={DOMAIN}\n"),
        ("meeting", "domain={DOMAIN}\n"),
        ("generic-app", "pw1={SSH_PASSWORD_1}\npw2={SSH_PASSWORD_2}\n"),
    ];
    for (stack, content) in templates {
        write_template(dir.path(), stack, content);
    }
    dir
}

pub fn write_template(root: &Path, stack: &str, content: &str) {
    std::fs::create_dir_all(root.join(stack)).unwrap();
    std::fs::write(root.join(stack).join("base.yml"), content).unwrap();
}

/// Config polling every 10ms for at most 50 attempts.
pub fn config(template_dir: &Path) -> Config {
    let mut config = Config::default();
    config.template_dir = template_dir.to_path_buf();
    config.default_image_id = "img-default".to_string();
    config.watch.poll_interval_ms = 10;
    config.watch.max_attempts = Some(50);
    config.volume.poll_interval_ms = 5;
    config.volume.max_attempts = 20;
    config.callback_timeout_ms = 5_000;
    config
}

pub fn orchestrator(cloud: &Arc<MockCloud>, config: Config) -> Orchestrator {
    Orchestrator::new(
        config,
        Arc::new(MockProvider { cloud: cloud.clone() }),
        cloud.clone(),
        cloud.clone(),
    )
    .unwrap()
}

pub fn requester() -> Requester {
    Requester {
        user_id: "u-42".to_string(),
        username: "alice".to_string(),
        email: Some("alice@example.org".to_string()),
    }
}

pub fn request(stack: StackKind, callback_url: &str) -> ProvisionRequest {
    ProvisionRequest {
        request_id: "req-1".to_string(),
        stack,
        name: "db-1".to_string(),
        requester: requester(),
        callback_url: callback_url.to_string(),
        allowed_ip: "203.0.113.7".to_string(),
        flavor: FlavorSelector::Id("f-medium".to_string()),
        network_id: None,
        image_id: None,
        disk_gb: None,
        ports: vec![],
        params: BTreeMap::new(),
    }
}
