//! OpenAPI contract parser.
//!
//! This module loads an OpenAPI v3 or Swagger 2.0 document, resolves its
//! internal references and extracts one [`Endpoint`] per supported
//! operation. Swagger `body`/`formData` parameters become a request body
//! and `schemes`/`host`/`basePath` become server URLs.
//! Malformed operations are logged and skipped; only a document that
//! cannot be read at all fails the load.

use crate::error::{OpenApiError, Result};
use crate::resolver::{resolve_refs, unresolvable_ref};
use crate::schema::{default_operation_id, sanitize_function_name};
use crate::types::{
    ApiInfo, BodySpec, Endpoint, HttpMethod, ParamType, ParameterLocation, ParameterSpec,
    ResponseSpec, SkippedOperation, path_placeholders,
};
use openapiv3::{Info, Operation, Parameter, ReferenceOr, Server};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Schema keywords a legacy parameter may carry at its top level.
const LEGACY_SCHEMA_KEYS: [&str; 7] = [
    "type", "items", "enum", "default", "minimum", "maximum", "format",
];

/// Everything extracted from one contract document.
#[derive(Debug, Clone)]
pub struct ParsedContract {
    pub info: ApiInfo,
    pub endpoints: Vec<Endpoint>,
    pub skipped: Vec<SkippedOperation>,
}

/// Parser for OpenAPI documents.
pub struct OpenApiParser {
    document: Value,
}

impl OpenApiParser {
    /// Load a document from a file.
    ///
    /// `.json` files are parsed as JSON; anything else is tried as JSON
    /// first, then YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let document = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| OpenApiError::ParseError(format!("{}: {}", path.display(), e)))?
        } else {
            parse_document(&content)?
        };

        Ok(Self { document })
    }

    /// Fetch and parse a document over HTTP.
    pub async fn from_url(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let content = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(Self {
            document: parse_document(&content)?,
        })
    }

    /// Parse a document held in memory, detecting JSON or YAML.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(Self {
            document: parse_document(content)?,
        })
    }

    /// Wrap an already-decoded document.
    pub fn from_value(document: Value) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Extract every supported operation.
    pub fn parse(&self) -> Result<ParsedContract> {
        let Some(paths) = self.document.get("paths").and_then(Value::as_object) else {
            return Err(OpenApiError::ParseError(
                "document has no `paths` object".to_string(),
            ));
        };
        let resolved = resolve_refs(&self.document);
        let mut endpoints = Vec::new();
        let mut skipped = Vec::new();

        for (path, raw_item) in paths {
            let resolved_item = resolved
                .get("paths")
                .and_then(|p| p.get(path))
                .unwrap_or(raw_item);
            let Some(path_item) = resolved_item.as_object() else {
                warn!("Path item for {} is not an object, skipping", path);
                skipped.push(SkippedOperation {
                    method: "*".to_string(),
                    path: path.clone(),
                    reason: "path item is not an object".to_string(),
                });
                continue;
            };

            let shared_params = path_item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for (key, raw_operation) in path_item {
                let Some(method) = HttpMethod::from_key(key) else {
                    continue;
                };

                match parse_operation(&resolved, path, method, raw_operation, &shared_params) {
                    Ok(endpoint) => {
                        debug!(
                            "Parsed {} as '{}'",
                            endpoint.display_name(),
                            endpoint.function_name
                        );
                        endpoints.push(endpoint);
                    }
                    Err(e) => {
                        warn!("Skipping operation {} {}: {}", method, path, e);
                        skipped.push(SkippedOperation {
                            method: method.to_string(),
                            path: path.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        let info = read_info(&self.document, endpoints.len());
        info!(
            "Loaded contract '{}' version {}: {} endpoints, {} skipped",
            info.title,
            info.version,
            endpoints.len(),
            skipped.len()
        );

        Ok(ParsedContract {
            info,
            endpoints,
            skipped,
        })
    }
}

/// Decode JSON, falling back to YAML.
fn parse_document(content: &str) -> Result<Value> {
    serde_json::from_str(content)
        .or_else(|_| serde_yaml::from_str::<Value>(content))
        .map_err(|e| OpenApiError::ParseError(e.to_string()))
}

fn read_info(document: &Value, endpoints_count: usize) -> ApiInfo {
    let info: Option<Info> = document
        .get("info")
        .and_then(|v| serde_json::from_value(v.clone()).ok());
    let servers: Vec<String> = match document.get("servers") {
        Some(servers) => serde_json::from_value::<Vec<Server>>(servers.clone())
            .map(|servers| servers.iter().map(server_url).collect())
            .unwrap_or_default(),
        None => legacy_servers(document),
    };

    let (title, description, version) = match info {
        Some(info) => (info.title, info.description.unwrap_or_default(), info.version),
        None => ("Unknown".to_string(), String::new(), "Unknown".to_string()),
    };

    ApiInfo {
        title,
        description,
        version,
        servers,
        endpoints_count,
    }
}

/// Server URL with each `{variable}` replaced by its default.
fn server_url(server: &Server) -> String {
    let mut url = server.url.clone();
    if let Some(variables) = &server.variables {
        for (name, variable) in variables {
            url = url.replace(&format!("{{{}}}", name), &variable.default);
        }
    }
    url
}

/// Server URLs from Swagger 2.0 `schemes`, `host` and `basePath`.
fn legacy_servers(document: &Value) -> Vec<String> {
    let base_path = document
        .get("basePath")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(host) = document.get("host").and_then(Value::as_str) else {
        if base_path.is_empty() {
            return Vec::new();
        }
        return vec![base_path.to_string()];
    };

    let schemes: Vec<&str> = document
        .get("schemes")
        .and_then(Value::as_array)
        .map(|schemes| schemes.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if schemes.is_empty() {
        return vec![format!("https://{}{}", host, base_path)];
    }
    schemes
        .iter()
        .map(|scheme| format!("{}://{}{}", scheme, host, base_path))
        .collect()
}

fn parse_operation(
    root: &Value,
    path: &str,
    method: HttpMethod,
    raw: &Value,
    shared_params: &[Value],
) -> Result<Endpoint> {
    let Some(raw) = raw.as_object() else {
        return Err(OpenApiError::InvalidOperation(
            "operation is not an object".to_string(),
        ));
    };

    let own_params = raw
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let consumes = raw.get("consumes").or_else(|| root.get("consumes"));
    let (params, legacy_body) =
        split_legacy_body(merge_parameters(shared_params, own_params), consumes)?;
    let params: Vec<Value> = params.into_iter().map(normalize_parameter).collect();

    let mut normalized = raw.clone();
    normalized.insert("parameters".to_string(), Value::Array(params.clone()));
    if let Some(body) = legacy_body {
        normalized.entry("requestBody").or_insert(body);
    }
    normalized
        .entry("responses")
        .or_insert_with(|| Value::Object(Map::new()));
    let normalized = Value::Object(normalized);

    if let Some(reference) = unresolvable_ref(&normalized, root) {
        return Err(OpenApiError::UnresolvedReference(reference.to_string()));
    }

    let operation: Operation = serde_json::from_value(normalized.clone())
        .map_err(|e| OpenApiError::InvalidOperation(e.to_string()))?;

    let mut parameters = Vec::with_capacity(params.len());
    for (typed, raw_param) in operation.parameters.iter().zip(&params) {
        let ReferenceOr::Item(param) = typed else {
            return Err(OpenApiError::UnresolvedReference(
                raw_param["$ref"].as_str().unwrap_or_default().to_string(),
            ));
        };
        parameters.push(parse_parameter(param, raw_param));
    }

    let mut seen = HashSet::new();
    for param in &parameters {
        if !seen.insert(param.name.as_str()) {
            return Err(OpenApiError::DuplicateParameter(param.name.clone()));
        }
    }

    for placeholder in path_placeholders(path) {
        if !seen.contains(placeholder) {
            return Err(OpenApiError::UnresolvedPlaceholder(placeholder.to_string()));
        }
    }

    let request_body = parse_request_body(&operation, &normalized)?;
    if let Some(body) = &request_body {
        check_body_conflicts(body, &seen)?;
    }

    let operation_id = operation
        .operation_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| default_operation_id(method.as_key(), path));
    let function_name = sanitize_function_name(&operation_id);

    Ok(Endpoint {
        path: path.to_string(),
        method,
        operation_id,
        function_name,
        summary: operation.summary.clone(),
        description: operation.description.clone(),
        parameters,
        request_body,
        responses: parse_responses(&normalized),
    })
}

/// Path-level parameters first, each replaced by an operation-level
/// parameter with the same name and location.
fn merge_parameters(shared: &[Value], own: &[Value]) -> Vec<Value> {
    let key = |p: &Value| {
        (
            p.get("name").and_then(Value::as_str).map(str::to_string),
            p.get("in").and_then(Value::as_str).map(str::to_string),
        )
    };

    let mut merged: Vec<Value> = shared
        .iter()
        .filter(|s| !own.iter().any(|o| key(o) == key(*s)))
        .cloned()
        .collect();
    merged.extend(own.iter().cloned());
    merged
}

/// Give a parameter without `schema` or `content` a schema built from its
/// top-level keywords.
fn normalize_parameter(mut param: Value) -> Value {
    let Some(map) = param.as_object_mut() else {
        return param;
    };
    if map.contains_key("schema") || map.contains_key("content") || map.contains_key("$ref") {
        return param;
    }

    let schema = take_legacy_schema(map);
    map.insert("schema".to_string(), Value::Object(schema));
    param
}

/// Remove the top-level schema keywords of a legacy parameter and return
/// them as a schema. `type: file` becomes a binary string.
fn take_legacy_schema(param: &mut Map<String, Value>) -> Map<String, Value> {
    let mut schema = Map::new();
    for key in LEGACY_SCHEMA_KEYS {
        if let Some(value) = param.remove(key) {
            schema.insert(key.to_string(), value);
        }
    }
    if schema.get("type").and_then(Value::as_str) == Some("file") {
        schema.insert("type".to_string(), json!("string"));
        schema.insert("format".to_string(), json!("binary"));
    }
    schema
        .entry("type")
        .or_insert_with(|| Value::String("string".to_string()));
    schema
}

/// Pull Swagger 2.0 `body` and `formData` parameters out of `params` and
/// turn them into an OpenAPI v3 `requestBody`.
fn split_legacy_body(
    params: Vec<Value>,
    consumes: Option<&Value>,
) -> Result<(Vec<Value>, Option<Value>)> {
    let location = |p: &Value| p.get("in").and_then(Value::as_str).map(str::to_string);
    let (body_params, rest): (Vec<Value>, Vec<Value>) = params
        .into_iter()
        .partition(|p| location(p).as_deref() == Some("body"));
    let (form_params, rest): (Vec<Value>, Vec<Value>) = rest
        .into_iter()
        .partition(|p| location(p).as_deref() == Some("formData"));

    let declared: Vec<&str> = consumes
        .and_then(Value::as_array)
        .map(|types| types.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let body = match (body_params.as_slice(), form_params.is_empty()) {
        ([], true) => None,
        ([body], true) => {
            let content_type = declared
                .iter()
                .find(|t| t.contains("json"))
                .or(declared.first())
                .copied()
                .unwrap_or("application/json");
            let schema = body.get("schema").cloned().unwrap_or_else(|| json!({}));
            Some(request_body(
                content_type,
                schema,
                body.get("required").and_then(Value::as_bool).unwrap_or(false),
                body.get("description"),
            ))
        }
        ([], false) => Some(form_body(form_params, &declared)),
        _ => {
            return Err(OpenApiError::InvalidOperation(
                "only one body parameter is allowed, and not together with formData".to_string(),
            ));
        }
    };
    Ok((rest, body))
}

fn form_body(params: Vec<Value>, declared: &[&str]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut has_file = false;

    for param in params {
        let Value::Object(mut map) = param else {
            continue;
        };
        let Some(name) = map.get("name").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        has_file |= map.get("type").and_then(Value::as_str) == Some("file");
        let mut schema = take_legacy_schema(&mut map);
        if let Some(description) = map.get("description") {
            schema.insert("description".to_string(), description.clone());
        }
        if map.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(Value::String(name.clone()));
        }
        properties.insert(name, Value::Object(schema));
    }

    let content_type = if has_file || declared.iter().any(|t| t.starts_with("multipart/")) {
        "multipart/form-data"
    } else {
        "application/x-www-form-urlencoded"
    };
    let is_required = !required.is_empty();
    let schema = json!({"type": "object", "properties": properties, "required": required});
    request_body(content_type, schema, is_required, None)
}

fn request_body(
    content_type: &str,
    schema: Value,
    required: bool,
    description: Option<&Value>,
) -> Value {
    let mut content = Map::new();
    content.insert(content_type.to_string(), json!({ "schema": schema }));

    let mut body = Map::new();
    body.insert("required".to_string(), Value::Bool(required));
    body.insert("content".to_string(), Value::Object(content));
    if let Some(description) = description.filter(|d| d.is_string()) {
        body.insert("description".to_string(), description.clone());
    }
    Value::Object(body)
}

fn parse_parameter(param: &Parameter, raw: &Value) -> ParameterSpec {
    let (data, location) = match param {
        Parameter::Query { parameter_data, .. } => (parameter_data, ParameterLocation::Query),
        Parameter::Header { parameter_data, .. } => (parameter_data, ParameterLocation::Header),
        Parameter::Path { parameter_data, .. } => (parameter_data, ParameterLocation::Path),
        Parameter::Cookie { parameter_data, .. } => (parameter_data, ParameterLocation::Cookie),
    };

    let schema = raw
        .get("schema")
        .or_else(|| preferred_media(raw.get("content")).and_then(|(_, m)| m.get("schema")))
        .cloned()
        .unwrap_or_else(|| json!({}));

    ParameterSpec {
        name: data.name.clone(),
        location,
        param_type: ParamType::of_schema(&schema),
        description: data.description.clone().filter(|d| !d.is_empty()),
        required: data.required,
        default: schema.get("default").cloned(),
        enum_values: schema.get("enum").and_then(Value::as_array).cloned(),
        minimum: schema.get("minimum").and_then(Value::as_number).cloned(),
        maximum: schema.get("maximum").and_then(Value::as_number).cloned(),
        format: schema.get("format").and_then(Value::as_str).map(str::to_string),
    }
}

fn parse_request_body(operation: &Operation, raw: &Value) -> Result<Option<BodySpec>> {
    let Some(body_ref) = &operation.request_body else {
        return Ok(None);
    };
    let ReferenceOr::Item(body) = body_ref else {
        return Err(OpenApiError::UnresolvedReference(
            "requestBody".to_string(),
        ));
    };

    let Some((content_type, media)) = preferred_media(raw.get("requestBody").and_then(|b| b.get("content")))
    else {
        debug!("Request body declares no content, ignoring it");
        return Ok(None);
    };

    Ok(Some(BodySpec {
        content_type: content_type.to_string(),
        required: body.required,
        description: body.description.clone(),
        schema: media.get("schema").cloned().unwrap_or_else(|| json!({})),
    }))
}

fn check_body_conflicts(body: &BodySpec, parameter_names: &HashSet<&str>) -> Result<()> {
    if body.is_object() {
        if let Some(props) = body.properties() {
            if let Some(name) = props.keys().find(|k| parameter_names.contains(k.as_str())) {
                return Err(OpenApiError::ParameterConflict(name.clone()));
            }
        }
    } else if parameter_names.contains("request_body") {
        return Err(OpenApiError::ParameterConflict("request_body".to_string()));
    }
    Ok(())
}

fn parse_responses(raw: &Value) -> Vec<ResponseSpec> {
    let Some(responses) = raw.get("responses").and_then(Value::as_object) else {
        return Vec::new();
    };

    responses
        .iter()
        .filter(|(status, _)| !status.starts_with("x-"))
        .map(|(status, response)| ResponseSpec {
            status: status.clone(),
            description: response
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            schema: preferred_media(response.get("content"))
                .and_then(|(_, media)| media.get("schema"))
                .or_else(|| response.get("schema"))
                .cloned(),
        })
        .collect()
}

/// `application/json` when declared, else the first media type.
fn preferred_media(content: Option<&Value>) -> Option<(&str, &Value)> {
    let content = content?.as_object()?;
    content
        .get("application/json")
        .map(|media| ("application/json", media))
        .or_else(|| content.iter().next().map(|(k, v)| (k.as_str(), v)))
}
