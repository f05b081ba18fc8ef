//! Translation of endpoints into function schemas.

use crate::types::{Endpoint, FunctionSchema, ParamType};
use serde_json::{Map, Value, json};

/// Name used when an operation id sanitizes to nothing.
const FALLBACK_FUNCTION_NAME: &str = "api_operation";

/// Keys copied verbatim from a source schema.
const PASSTHROUGH_KEYS: [&str; 6] = [
    "description",
    "enum",
    "default",
    "minimum",
    "maximum",
    "format",
];

/// Replace anything outside `[A-Za-z0-9_]` with `_`, collapse runs of
/// underscores and trim them from both ends.
pub fn sanitize_function_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }
    let trimmed = name.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_FUNCTION_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turn a path template into a name fragment: `/users/{id}/posts` becomes
/// `users_by_id_posts`.
pub fn path_to_name(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        match rest[start..].find('}') {
            Some(len) => {
                collapsed.push_str(&rest[..start]);
                collapsed.push_str("by_id");
                rest = &rest[start + len + 1..];
            }
            None => break,
        }
    }
    collapsed.push_str(rest);

    let name = sanitize_function_name(collapsed.trim_start_matches('/'));
    if name == FALLBACK_FUNCTION_NAME && !collapsed.chars().any(|c| c.is_ascii_alphanumeric()) {
        "api".to_string()
    } else {
        name
    }
}

/// Default operation id for an operation that declares none.
pub fn default_operation_id(method: &str, path: &str) -> String {
    format!("{}_{}", method.to_ascii_lowercase(), path_to_name(path))
}

/// `summary | description | Endpoint: METHOD /path`, skipping a
/// description that repeats the summary.
pub fn function_description(endpoint: &Endpoint) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(summary) = endpoint.summary.as_deref().filter(|s| !s.is_empty()) {
        parts.push(summary.to_string());
    }
    if let Some(description) = endpoint.description.as_deref().filter(|d| !d.is_empty())
        && endpoint.summary.as_deref() != Some(description)
    {
        parts.push(description.to_string());
    }
    parts.push(format!("Endpoint: {} {}", endpoint.method, endpoint.path));
    parts.join(" | ")
}

/// Build the function schema for one endpoint.
///
/// Parameters come first, then body properties for an object body or a
/// single `request_body` property otherwise.
pub fn to_function_schema(endpoint: &Endpoint) -> FunctionSchema {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();
    let placeholders = endpoint.path_placeholders();

    for param in &endpoint.parameters {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(param.param_type.as_str()));
        prop.insert(
            "description".into(),
            json!(
                param
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{} parameter", param.name))
            ),
        );
        if let Some(values) = &param.enum_values {
            prop.insert("enum".into(), json!(values));
        }
        if let Some(min) = &param.minimum {
            prop.insert("minimum".into(), Value::Number(min.clone()));
        }
        if let Some(max) = &param.maximum {
            prop.insert("maximum".into(), Value::Number(max.clone()));
        }
        if let Some(format) = &param.format {
            prop.insert("format".into(), json!(format));
        }
        if let Some(default) = &param.default {
            prop.insert("default".into(), default.clone());
        }
        properties.insert(param.name.clone(), Value::Object(prop));

        if param.required || placeholders.contains(&param.name.as_str()) {
            required.push(json!(param.name));
        }
    }

    if let Some(body) = &endpoint.request_body {
        if body.is_object() {
            if let Some(body_props) = body.properties() {
                for (name, schema) in body_props {
                    properties.insert(name.clone(), convert_schema(schema));
                }
            }
            if body.required {
                required.extend(body.required_fields().into_iter().map(|f| json!(f)));
            }
        } else {
            properties.insert("request_body".into(), convert_schema(&body.schema));
            if body.required {
                required.push(json!("request_body"));
            }
        }
    }

    FunctionSchema {
        name: endpoint.function_name.clone(),
        description: function_description(endpoint),
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

/// Reduce a JSON schema to the subset a function schema carries,
/// recursing into `items` and `properties`.
pub fn convert_schema(schema: &Value) -> Value {
    let schema_type = ParamType::of_schema(schema);
    let mut converted = Map::new();
    converted.insert("type".into(), json!(schema_type.as_str()));

    for key in PASSTHROUGH_KEYS {
        if let Some(value) = schema.get(key) {
            converted.insert(key.into(), value.clone());
        }
    }

    match schema_type {
        ParamType::Array => {
            if let Some(items) = schema.get("items") {
                converted.insert("items".into(), convert_schema(items));
            }
        }
        ParamType::Object => {
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                let nested: Map<String, Value> = props
                    .iter()
                    .map(|(name, prop)| (name.clone(), convert_schema(prop)))
                    .collect();
                converted.insert("properties".into(), Value::Object(nested));
                if let Some(req) = schema.get("required") {
                    converted.insert("required".into(), req.clone());
                }
            }
        }
        _ => {}
    }

    Value::Object(converted)
}
