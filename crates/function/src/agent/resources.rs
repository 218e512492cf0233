//! Resource-to-Text Conversion
//!
//! Renders observed resources as pretty JSON for the prompt. Object keys
//! come out sorted, and empty values plus bookkeeping metadata are dropped
//! to keep the token count down. Connection details are never rendered.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::prompt::RenderError;
use crate::function::request::{Ready, Resource};

const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

#[derive(Serialize)]
struct ResourceView<'a> {
    #[serde(skip_serializing_if = "Value::is_null")]
    resource: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    ready: Option<&'a str>,
}

fn ready_name(ready: Ready) -> Option<&'static str> {
    match ready {
        Ready::Unspecified => None,
        Ready::True => Some("READY_TRUE"),
        Ready::False => Some("READY_FALSE"),
    }
}

/// Drop object fields that are null, empty strings, or empty arrays and
/// objects, recursively. Array elements are pruned inside but never removed,
/// so positions are preserved. Object keys are re-inserted in sorted order.
pub fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(prune).collect()),
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn strip_bookkeeping(resource: &mut Value) {
    if let Some(metadata) = resource.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove("managedFields");
        if let Some(annotations) = metadata.get_mut("annotations").and_then(Value::as_object_mut) {
            annotations.remove(LAST_APPLIED_ANNOTATION);
        }
    }
}

fn view(resource: &Resource) -> ResourceView<'static> {
    let mut body = resource.resource.clone();
    strip_bookkeeping(&mut body);
    ResourceView {
        resource: prune(body),
        ready: ready_name(resource.ready),
    }
}

/// Render a single resource.
pub fn resource_to_text(resource: &Resource) -> Result<String, RenderError> {
    serde_json::to_string_pretty(&view(resource)).map_err(|source| RenderError::Resource {
        key: "composite".to_string(),
        source,
    })
}

/// Render a named set of resources as one JSON object keyed by name. Any
/// resource that fails to render aborts the whole conversion.
pub fn resources_to_text(resources: &BTreeMap<String, Resource>) -> Result<String, RenderError> {
    let mut rendered = Map::new();
    for (key, resource) in resources {
        let value = serde_json::to_value(view(resource)).map_err(|source| RenderError::Resource {
            key: key.clone(),
            source,
        })?;
        rendered.insert(key.clone(), value);
    }

    serde_json::to_string_pretty(&Value::Object(rendered)).map_err(|source| RenderError::Resource {
        key: "composed".to_string(),
        source,
    })
}
