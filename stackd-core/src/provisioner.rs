//! Flavor resolution and instance creation.

use crate::capabilities::{BlockStorage, CloudSession};
use crate::config::VolumeSettings;
use crate::error::{ProvisionError, Result};
use crate::profiles::BootMode;
use crate::saga::{Compensation, Saga, Scope};
use crate::types::{FlavorFilter, FlavorSelector, FlavorSpec, Instance, InstanceSpec, Volume, VolumeSpec};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Polling policy for volume availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeWaitPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl From<&VolumeSettings> for VolumeWaitPolicy {
    fn from(settings: &VolumeSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.poll_interval_ms),
            max_attempts: settings.max_attempts,
        }
    }
}

/// Flavor chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFlavor {
    pub id: String,
    /// Disk size dictated by a matched or created flavor.
    pub disk_gb: Option<u32>,
    pub created: bool,
}

/// Resolve the flavor selector.
///
/// `Id` is used verbatim, with its disk size looked up when visible. `Spec` picks the first visible flavor with exactly
/// the requested dimensions, or creates a private `{request_id}-{stack}`
/// flavor through `admin` and records it for compensation.
#[instrument(skip(session, admin, saga))]
pub async fn resolve_flavor(
    selector: &FlavorSelector,
    request_id: &str,
    stack: &str,
    session: &CloudSession,
    admin: Option<CloudSession>,
    saga: &mut Saga,
) -> Result<ResolvedFlavor> {
    let (vcpus, ram_mb, disk_gb) = match selector {
        FlavorSelector::Id(id) => {
            let disk_gb = match session.compute.get_flavor(id).await {
                Ok(flavor) => Some(flavor.disk_gb),
                Err(e) => {
                    debug!(flavor_id = %id, error = %e, "Flavor lookup failed, disk size left to request");
                    None
                }
            };
            return Ok(ResolvedFlavor { id: id.clone(), disk_gb, created: false });
        }
        FlavorSelector::Spec { vcpus, ram_mb, disk_gb } => (*vcpus, *ram_mb, *disk_gb),
    };

    let flavors = session
        .compute
        .list_flavors(&FlavorFilter::default())
        .await
        .map_err(|e| ProvisionError::FlavorResolution { reason: e.to_string() })?;

    if let Some(flavor) = flavors.into_iter().find(|f| f.matches(vcpus, ram_mb, disk_gb)) {
        debug!(flavor_id = %flavor.id, "Matched existing flavor");
        return Ok(ResolvedFlavor { id: flavor.id, disk_gb: Some(flavor.disk_gb), created: false });
    }

    let (target, scope) = match admin {
        Some(admin) => {
            saga.set_admin_session(admin.clone());
            (admin, Scope::Admin)
        }
        None => (session.clone(), Scope::Requester),
    };

    let spec = FlavorSpec {
        name: format!("{}-{}", request_id, stack),
        vcpus,
        ram_mb,
        disk_gb,
        public: false,
    };
    let flavor = target
        .compute
        .create_flavor(&spec)
        .await
        .map_err(|e| ProvisionError::FlavorResolution { reason: e.to_string() })?;

    info!(flavor_id = %flavor.id, name = %flavor.name, "Created flavor");
    saga.record(Compensation::DeleteFlavor { flavor_id: flavor.id.clone(), scope });

    Ok(ResolvedFlavor { id: flavor.id, disk_gb: Some(flavor.disk_gb), created: true })
}

/// Issues the instance-creation call for a boot mode.
pub struct InstanceProvisioner<'a> {
    session: &'a CloudSession,
    volume_policy: VolumeWaitPolicy,
}

impl<'a> InstanceProvisioner<'a> {
    pub fn new(session: &'a CloudSession, volume_policy: VolumeWaitPolicy) -> Self {
        Self { session, volume_policy }
    }

    /// Create the instance. No retry is attempted.
    #[instrument(skip(self, spec, saga), fields(name = %spec.name, mode = %mode))]
    pub async fn provision(
        &self,
        mode: &BootMode,
        mut spec: InstanceSpec,
        saga: &mut Saga,
    ) -> Result<Instance> {
        let name = spec.name.clone();
        let provisioner_error =
            |e: ProvisionError| ProvisionError::Provisioner { name: name.clone(), reason: e.to_string() };

        match mode {
            BootMode::Image => {
                self.session.compute.create_instance(&spec).await.map_err(provisioner_error)
            }
            BootMode::Volume { volume_type } => {
                let volume_spec = VolumeSpec {
                    name: format!("{}-volume", spec.name),
                    image_id: spec.image_id.clone(),
                    size_gb: spec.disk_gb,
                    volume_type: volume_type.clone(),
                };
                let volume = self
                    .session
                    .block_storage
                    .create_volume_from_image(&volume_spec)
                    .await
                    .map_err(provisioner_error)?;
                saga.record(Compensation::DeleteVolume { volume_id: volume.id.clone() });
                info!(volume_id = %volume.id, "Created boot volume");

                let volume = wait_for_volume(
                    self.session.block_storage.as_ref(),
                    &volume.id,
                    self.volume_policy,
                )
                .await?;

                spec.image_id = volume.id;
                self.session
                    .compute
                    .create_instance_from_volume(&spec)
                    .await
                    .map_err(provisioner_error)
            }
        }
    }
}

/// Poll a volume until it is available.
///
/// Fails fast when the volume enters an error state. Fetch errors count as
/// an attempt and polling continues.
pub async fn wait_for_volume(
    storage: &dyn BlockStorage,
    volume_id: &str,
    policy: VolumeWaitPolicy,
) -> Result<Volume> {
    for attempt in 1..=policy.max_attempts {
        match storage.get_volume(volume_id).await {
            Ok(volume) if volume.is_available() => {
                debug!(volume_id, attempt, "Volume available");
                return Ok(volume);
            }
            Ok(volume) if volume.is_failed() => {
                return Err(ProvisionError::VolumeNotReady {
                    volume_id: volume_id.to_string(),
                    reason: format!("volume entered status {}", volume.status),
                });
            }
            Ok(volume) => debug!(volume_id, attempt, status = %volume.status, "Waiting for volume"),
            Err(e) => warn!(volume_id, attempt, error = %e, "Failed to fetch volume status"),
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(ProvisionError::VolumeNotReady {
        volume_id: volume_id.to_string(),
        reason: format!("not available after {} attempts", policy.max_attempts),
    })
}
