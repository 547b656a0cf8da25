//! Callback delivery.
//!
//! The payload is POSTed once as `application/json`. The receiver
//! acknowledges by answering with the exact body `Ok`; anything else is a
//! rejection. Failures are logged and counted, never retried.

use crate::error::{ProvisionError, Result};
use crate::observability::metrics;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Literal response body that acknowledges a callback.
pub const ACK_BODY: &str = "Ok";

/// Whether a response body acknowledges the callback.
pub fn is_acknowledged(body: &str) -> bool {
    body == ACK_BODY
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Acknowledged,
    Rejected { status: u16, body: String },
}

impl Delivery {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }
}

/// Posts callback payloads to caller-supplied URLs.
#[derive(Debug, Clone)]
pub struct CallbackDispatcher {
    client: reqwest::Client,
}

impl CallbackDispatcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProvisionError::internal)?;
        Ok(Self { client })
    }

    /// Send one POST and classify the response.
    pub async fn dispatch<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> Result<Delivery> {
        let delivery_error =
            |e: reqwest::Error| ProvisionError::CallbackDelivery { url: url.to_string(), reason: e.to_string() };

        let response = self.client.post(url).json(payload).send().await.map_err(delivery_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(delivery_error)?;

        if is_acknowledged(&body) {
            Ok(Delivery::Acknowledged)
        } else {
            Ok(Delivery::Rejected { status, body })
        }
    }

    /// Deliver once, logging the outcome. Returns whether it was acknowledged.
    #[instrument(skip(self, payload))]
    pub async fn deliver<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> bool {
        match self.dispatch(url, payload).await {
            Ok(Delivery::Acknowledged) => {
                metrics::record_callback("acknowledged");
                info!("Callback acknowledged");
                true
            }
            Ok(Delivery::Rejected { status, body }) => {
                metrics::record_callback("rejected");
                warn!(status, body = %truncate(&body, 200), "Callback not acknowledged");
                false
            }
            Err(e) => {
                metrics::record_callback("error");
                warn!(error = %e, "Callback delivery failed");
                false
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
