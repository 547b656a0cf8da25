//! Configuration management.

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `<stack>/base.yml` bootstrap templates.
    pub template_dir: PathBuf,
    /// Image used when a request carries no image override.
    pub default_image_id: String,
    /// Placement hint passed to instance creation.
    pub availability_zone: String,
    pub config_drive: bool,
    pub keypair: Option<String>,
    pub admin: AdminIdentity,
    pub watch: WatchSettings,
    pub volume: VolumeSettings,
    pub callback_timeout_ms: u64,
    pub log_level: String,
    /// Prometheus listener port; metrics export is disabled when unset.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("files"),
            default_image_id: String::new(),
            availability_zone: "nova".to_string(),
            config_drive: true,
            keypair: None,
            admin: AdminIdentity::default(),
            watch: WatchSettings::default(),
            volume: VolumeSettings::default(),
            callback_timeout_ms: 30_000,
            log_level: "info".to_string(),
            metrics_port: None,
        }
    }
}

/// Administrative identity used for network lookups and flavor creation.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminIdentity {
    pub identity_endpoint: String,
    pub username: String,
    pub password: String,
    pub tenant_id: String,
    pub domain_id: String,
}

impl std::fmt::Debug for AdminIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminIdentity")
            .field("identity_endpoint", &self.identity_endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("domain_id", &self.domain_id)
            .finish()
    }
}

/// Readiness watch policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub poll_interval_ms: u64,
    /// Maximum status fetches; unbounded when unset.
    pub max_attempts: Option<u32>,
    /// Overall deadline in seconds; unbounded when unset.
    pub deadline_secs: Option<u64>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { poll_interval_ms: 3_000, max_attempts: Some(600), deadline_secs: None }
    }
}

/// Volume availability wait settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self { poll_interval_ms: 2_000, max_attempts: 150 }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProvisionError::Io { path: path.to_path_buf(), source: e })?;
        serde_json::from_str(&content).map_err(|e| ProvisionError::InvalidConfig {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })
    }

    /// Apply `STACKD_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("STACKD_TEMPLATE_DIR") {
            self.template_dir = PathBuf::from(dir);
        }
        if let Some(image) = lookup("STACKD_IMAGE_ID") {
            self.default_image_id = image;
        }
        if let Some(endpoint) = lookup("STACKD_ADMIN_IDENTITY_ENDPOINT") {
            self.admin.identity_endpoint = endpoint;
        }
        if let Some(username) = lookup("STACKD_ADMIN_USERNAME") {
            self.admin.username = username;
        }
        if let Some(password) = lookup("STACKD_ADMIN_PASSWORD") {
            self.admin.password = password;
        }
        if let Some(tenant) = lookup("STACKD_ADMIN_TENANT_ID") {
            self.admin.tenant_id = tenant;
        }
        if let Some(interval) = lookup("STACKD_POLL_INTERVAL_MS") {
            self.watch.poll_interval_ms = parse_env("STACKD_POLL_INTERVAL_MS", &interval)?;
        }
        if let Some(attempts) = lookup("STACKD_MAX_POLL_ATTEMPTS") {
            self.watch.max_attempts = Some(parse_env("STACKD_MAX_POLL_ATTEMPTS", &attempts)?);
        }
        if let Some(port) = lookup("STACKD_METRICS_PORT") {
            self.metrics_port = Some(parse_env("STACKD_METRICS_PORT", &port)?);
        }
        Ok(())
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.template_dir.as_os_str().is_empty() {
            return Err(invalid("template_dir must not be empty"));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(invalid("watch.poll_interval_ms must be greater than zero"));
        }
        if self.watch.max_attempts == Some(0) {
            return Err(invalid("watch.max_attempts must be greater than zero when set"));
        }
        if self.volume.poll_interval_ms == 0 || self.volume.max_attempts == 0 {
            return Err(invalid("volume wait policy must be non-zero"));
        }
        if self.callback_timeout_ms == 0 {
            return Err(invalid("callback_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ProvisionError::InvalidConfig {
        reason: format!("{} has an invalid value: {}", key, value),
    })
}

fn invalid(reason: &str) -> ProvisionError {
    ProvisionError::InvalidConfig { reason: reason.to_string() }
}
