//! Network resolution.

use crate::capabilities::Networking;
use crate::config::AdminIdentity;
use crate::error::{ProvisionError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks the network an instance is attached to.
///
/// A network id on the request is used verbatim. Otherwise the first
/// available network visible to the administrative identity is used. Lookup
/// failures degrade to an empty id (provider default) instead of failing.
#[derive(Clone)]
pub struct NetworkResolver {
    networking: Arc<dyn Networking>,
    admin: AdminIdentity,
}

impl NetworkResolver {
    pub fn new(networking: Arc<dyn Networking>, admin: AdminIdentity) -> Self {
        Self { networking, admin }
    }

    /// Resolve without degrading.
    pub async fn try_resolve(&self, requested: Option<&str>) -> Result<String> {
        if let Some(id) = requested.filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        self.networking
            .resolve_available_network(&self.admin)
            .await
            .map_err(|e| ProvisionError::NetworkResolution { reason: e.to_string() })
    }

    /// Resolve, falling back to an empty network id.
    pub async fn resolve(&self, requested: Option<&str>) -> String {
        match self.try_resolve(requested).await {
            Ok(id) => {
                debug!(network_id = %id, "Resolved network");
                id
            }
            Err(e) => {
                warn!(error = %e, "Network resolution failed, using provider default");
                String::new()
            }
        }
    }
}
