//! RunFunction envelope types
//!
//! Mirrors the Crossplane `RunFunctionRequest` / `RunFunctionResponse`
//! messages in their protobuf JSON form: camelCase field names, bytes as
//! base64 strings and enums as their proto value names.

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Opaque bytes carried as standard base64 in JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes)
            .map_err(serde::de::Error::custom)
    }
}

impl From<&str> for Bytes {
    fn from(value: &str) -> Self {
        Bytes(value.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunFunctionRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    #[serde(default)]
    pub observed: State,
    #[serde(default)]
    pub desired: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<String, Credentials>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Resource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, Resource>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Ready {
    #[default]
    #[serde(rename = "READY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "READY_TRUE")]
    True,
    #[serde(rename = "READY_FALSE")]
    False,
}

impl Ready {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Ready::Unspecified)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub resource: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connection_details: BTreeMap<String, Bytes>,
    #[serde(default, skip_serializing_if = "Ready::is_unspecified")]
    pub ready: Ready,
}

impl Resource {
    /// Conditions under `status.conditions`, if the resource reports any.
    pub fn conditions(&self) -> &[serde_json::Value] {
        self.resource
            .pointer("/status/conditions")
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The `status.conditions` entry with the given type.
    pub fn condition(&self, condition_type: &str) -> Option<&serde_json::Value> {
        self.conditions()
            .iter()
            .find(|c| c.get("type").and_then(serde_json::Value::as_str) == Some(condition_type))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_data: Option<CredentialData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialData {
    #[serde(default)]
    pub data: BTreeMap<String, Bytes>,
}

impl Credentials {
    pub fn from_data<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<[u8]>,
    {
        Self {
            credential_data: Some(CredentialData {
                data: entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), Bytes(v.as_ref().to_vec())))
                    .collect(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Protobuf JSON duration, e.g. `60s`.
    pub ttl: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunFunctionResponse {
    pub meta: ResponseMeta,
    #[serde(default)]
    pub desired: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FunctionResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    #[serde(rename = "SEVERITY_FATAL")]
    Fatal,
    #[serde(rename = "SEVERITY_WARNING")]
    Warning,
    #[serde(rename = "SEVERITY_NORMAL")]
    Normal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Target {
    #[serde(rename = "TARGET_COMPOSITE")]
    Composite,
    #[serde(rename = "TARGET_COMPOSITE_AND_CLAIM")]
    CompositeAndClaim,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionStatus {
    #[serde(rename = "STATUS_CONDITION_UNKNOWN")]
    Unknown,
    #[serde(rename = "STATUS_CONDITION_TRUE")]
    True,
    #[serde(rename = "STATUS_CONDITION_FALSE")]
    False,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parses_protojson() {
        let request: RunFunctionRequest = serde_json::from_value(json!({
            "meta": {"tag": "abc"},
            "observed": {
                "composite": {
                    "resource": {"apiVersion": "example.org/v1", "kind": "XDatabase"},
                    "connectionDetails": {"password": "c2VjcmV0"}
                },
                "resources": {
                    "db": {"resource": {"kind": "RDSInstance"}, "ready": "READY_FALSE"}
                }
            },
            "credentials": {
                "claude": {"credentialData": {"data": {"ANTHROPIC_API_KEY": "a2V5Cg=="}}}
            }
        }))
        .unwrap();

        assert_eq!(request.meta.tag, "abc");
        let composite = request.observed.composite.unwrap();
        assert_eq!(composite.connection_details["password"], Bytes::from("secret"));
        assert_eq!(request.observed.resources["db"].ready, Ready::False);
        let creds = request.credentials["claude"].credential_data.as_ref().unwrap();
        assert_eq!(creds.data["ANTHROPIC_API_KEY"], Bytes::from("key\n"));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let result: Result<Bytes, _> = serde_json::from_value(json!("not base64!"));
        assert!(result.is_err());
    }

    #[test]
    fn test_condition_lookup() {
        let resource = Resource {
            resource: json!({
                "status": {"conditions": [
                    {"type": "Ready", "status": "True"},
                    {"type": "Synced", "status": "False"}
                ]}
            }),
            ..Default::default()
        };
        assert_eq!(resource.conditions().len(), 2);
        assert_eq!(resource.condition("Synced").unwrap()["status"], "False");
        assert!(resource.condition("Missing").is_none());
        assert!(Resource::default().conditions().is_empty());
    }

    #[test]
    fn test_response_serializes_enum_names() {
        let condition = Condition {
            condition_type: "HealthyAccordingToClaude".to_string(),
            status: ConditionStatus::from(false),
            reason: "[]".to_string(),
            message: Some("ok".to_string()),
            target: None,
        };
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["type"], "HealthyAccordingToClaude");
        assert_eq!(value["status"], "STATUS_CONDITION_FALSE");
        assert!(value.get("target").is_none());
    }
}
