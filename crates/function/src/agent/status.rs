//! Composition Status Codec
//!
//! The status Claude submits through the `submit_status` tool, and its
//! mapping to and from the condition stored on the composite resource.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Condition type the function owns on the composite resource.
pub const CONDITION_TYPE: &str = "HealthyAccordingToClaude";

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("cannot decode composition status: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("cannot encode composition status: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cannot decode resource statuses from condition reason: {0}")]
    Reason(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OverallStatus {
    Ready,
    /// Anything other than `Ready` counts as not ready.
    #[default]
    #[serde(other)]
    NotReady,
}

impl OverallStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, OverallStatus::Ready)
    }
}

/// Status of a single resource as reported by Claude. Entries are
/// conventionally unhealthy, so `ready` is normally false.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub kind: String,
    pub api_version: String,
    pub ready: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompositionStatus {
    pub resource_statuses: Vec<ResourceStatus>,
    pub overall_status: OverallStatus,
    pub summary: String,
}

/// What a status becomes on the composite resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionParts {
    pub ready: bool,
    pub message: String,
    pub reason: String,
}

impl CompositionStatus {
    pub fn decode(json: &str) -> Result<Self, StatusError> {
        serde_json::from_str(json).map_err(StatusError::Decode)
    }

    pub fn encode(&self) -> Result<String, StatusError> {
        serde_json::to_string(self).map_err(StatusError::Encode)
    }

    /// The resource statuses as stored in a condition reason.
    pub fn encode_resource_statuses(&self) -> Result<String, StatusError> {
        serde_json::to_string(&self.resource_statuses).map_err(StatusError::Encode)
    }

    pub fn to_condition_parts(&self) -> Result<ConditionParts, StatusError> {
        Ok(ConditionParts {
            ready: self.overall_status.is_ready(),
            message: self.summary.clone(),
            reason: self.encode_resource_statuses()?,
        })
    }

    /// Rebuild a status from a Kubernetes condition (`type`, `status`,
    /// `reason`, `message`) previously written by this function.
    pub fn from_condition(condition: &serde_json::Value) -> Result<Self, StatusError> {
        let field = |name: &str| condition.get(name).and_then(serde_json::Value::as_str).unwrap_or("");

        let reason = field("reason");
        let resource_statuses = if reason.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(reason).map_err(StatusError::Reason)?
        };

        let overall_status = if field("status") == "True" {
            OverallStatus::Ready
        } else {
            OverallStatus::NotReady
        };

        Ok(Self {
            resource_statuses,
            overall_status,
            summary: field("message").to_string(),
        })
    }
}
