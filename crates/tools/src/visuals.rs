//! Dashboard visual specs returned by [`Module::visualize`](biosim_kernel::Module::visualize).
//!
//! A spec is a JSON object with a non-empty `render` string naming the
//! widget, a `data` object and an optional `description` string. Anything
//! else is rejected before it reaches a dashboard.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualSpec {
    pub render: String,
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisualError {
    #[error("visual spec must be a dict (JSON object), got {0}")]
    NotAnObject(&'static str),
    #[error("visual spec is missing '{0}'")]
    Missing(&'static str),
    #[error("'render' must be a non-empty string")]
    BadRender,
    #[error("'data' must be a dict (JSON object)")]
    BadData,
    #[error("'description' must be a string")]
    BadDescription,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check one spec and convert it to its typed form.
pub fn validate_visual_spec(value: &Value) -> Result<VisualSpec, VisualError> {
    let Value::Object(spec) = value else {
        return Err(VisualError::NotAnObject(kind(value)));
    };
    let render = spec.get("render").ok_or(VisualError::Missing("render"))?;
    let data = spec.get("data").ok_or(VisualError::Missing("data"))?;
    let render = match render.as_str() {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => return Err(VisualError::BadRender),
    };
    let data = data.as_object().ok_or(VisualError::BadData)?.clone();
    let description = match spec.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(d)) => Some(d.clone()),
        Some(_) => return Err(VisualError::BadDescription),
    };
    Ok(VisualSpec {
        render,
        data,
        description,
    })
}

/// Accept a single spec, an array of specs or null, and keep the valid
/// ones in order. Invalid entries are logged and dropped.
pub fn normalize_visuals(value: &Value) -> Vec<VisualSpec> {
    let items = match value {
        Value::Null => return Vec::new(),
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    items
        .iter()
        .filter_map(|item| match validate_visual_spec(item) {
            Ok(spec) => Some(spec),
            Err(err) => {
                tracing::debug!(error = %err, "invalid visual spec dropped");
                None
            }
        })
        .collect()
}
