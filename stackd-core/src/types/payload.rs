//! Callback payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result delivered to the caller's callback URL once the instance is active.
///
/// Serializes as a flat JSON object: `{"requestId": ..., <stack fields>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(rename = "requestId")]
    pub request_id: String,

    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl CallbackPayload {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), fields: BTreeMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}
