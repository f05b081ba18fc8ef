//! Data structures for parsed contracts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// HTTP methods an endpoint can be declared with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Methods an operation is extracted for, in contract order.
    pub const SUPPORTED: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    /// Parse a lowercase path-item key such as `get`.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::SUPPORTED
            .into_iter()
            .find(|m| m.as_key() == key.to_ascii_lowercase())
    }

    /// Lowercase form used in contracts and generated names.
    pub fn as_key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
        }
    }

    /// Whether a request body is sent for this method.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key().to_uppercase())
    }
}

/// Location where a parameter appears in the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path parameter (e.g., /users/{id})
    Path,
    /// Query parameter (e.g., ?search=value)
    Query,
    /// Header parameter (e.g., X-Custom-Header)
    Header,
    /// Cookie parameter
    Cookie,
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

/// Declared type of a parameter or body field.
///
/// Unknown type tags are treated as `String`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Number,
    Boolean,
    String,
    Array,
    Object,
}

impl ParamType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "integer" => ParamType::Integer,
            "number" => ParamType::Number,
            "boolean" => ParamType::Boolean,
            "array" => ParamType::Array,
            "object" => ParamType::Object,
            _ => ParamType::String,
        }
    }

    /// Type of a JSON schema fragment, defaulting to `String`.
    pub fn of_schema(schema: &Value) -> Self {
        match schema.get("type").and_then(Value::as_str) {
            Some(tag) => Self::from_tag(tag),
            None if schema.get("properties").is_some() || schema.get("$ref").is_some() => {
                ParamType::Object
            }
            None => ParamType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamType::Integer | ParamType::Number)
    }
}

impl fmt::Display for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.param_type.as_str(), self.location)
    }
}

/// A declared operation parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpec {
    /// Name as declared in the contract; unique within its endpoint
    pub name: String,
    /// Location of the parameter
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ParameterSpec {
    /// A bare parameter of the given type, mostly useful in tests.
    pub fn new(name: impl Into<String>, location: ParameterLocation, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            location,
            param_type,
            description: None,
            required: false,
            default: None,
            enum_values: None,
            minimum: None,
            maximum: None,
            format: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_range(mut self, minimum: Option<Number>, maximum: Option<Number>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }
}

/// Declared request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodySpec {
    pub content_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the payload
    pub schema: Value,
}

impl BodySpec {
    /// Whether the body is an object whose properties are flattened into
    /// the function arguments.
    pub fn is_object(&self) -> bool {
        ParamType::of_schema(&self.schema) == ParamType::Object
            && self.schema.get("$ref").is_none()
    }

    /// Declared properties of an object body.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        if !self.is_object() {
            return None;
        }
        self.schema.get("properties").and_then(Value::as_object)
    }

    /// Property names listed in the body schema's `required` array.
    pub fn required_fields(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Type of the whole payload.
    pub fn body_type(&self) -> ParamType {
        ParamType::of_schema(&self.schema)
    }

    pub fn is_json(&self) -> bool {
        is_json_content_type(&self.content_type)
    }
}

pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Declared response for one status code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSpec {
    /// Status code (`200`), range (`2XX`) or `default`
    pub status: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// One HTTP operation extracted from a contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    /// Path template (e.g., "/users/{id}")
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: String,
    /// Sanitized operation id, unique within the contract
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<BodySpec>,
    #[serde(default)]
    pub responses: Vec<ResponseSpec>,
}

impl Endpoint {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of the `{name}` placeholders in the path template.
    pub fn path_placeholders(&self) -> Vec<&str> {
        path_placeholders(&self.path)
    }

    /// Whether the parameter is substituted into the path.
    pub fn is_path_parameter(&self, name: &str) -> bool {
        self.path_placeholders().contains(&name)
    }

    /// `METHOD /path`, used in logs and error messages.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Extract `{name}` placeholders from a path template, in order.
pub fn path_placeholders(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Basic API metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApiInfo {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(default)]
    pub servers: Vec<String>,
    pub endpoints_count: usize,
}

/// Description of an endpoint for an external function-selection service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    /// `{"type": "object", "properties": {...}, "required": [...]}`
    pub parameters: Value,
}

impl FunctionSchema {
    /// Wrap as `{"type": "function", "function": {...}}`.
    pub fn to_tool_definition(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// Names listed as required.
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// An operation skipped while loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedOperation {
    pub method: String,
    pub path: String,
    pub reason: String,
}

/// Type-checked, default-filled arguments for one endpoint.
///
/// Only produced by validation, so every key is declared by the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCall<'a> {
    pub(crate) endpoint: &'a Endpoint,
    pub(crate) arguments: Map<String, Value>,
}

impl<'a> ValidatedCall<'a> {
    pub fn endpoint(&self) -> &'a Endpoint {
        self.endpoint
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub fn into_arguments(self) -> Map<String, Value> {
        self.arguments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_placeholders() {
        assert_eq!(path_placeholders("/users/{id}"), vec!["id"]);
        assert_eq!(
            path_placeholders("/orgs/{org}/repos/{repo}/issues"),
            vec!["org", "repo"]
        );
        assert!(path_placeholders("/health").is_empty());
        assert!(path_placeholders("/broken/{id").is_empty());
    }

    #[test]
    fn test_param_type_from_tag() {
        assert_eq!(ParamType::from_tag("integer"), ParamType::Integer);
        assert_eq!(ParamType::from_tag("file"), ParamType::String);
        assert_eq!(ParamType::of_schema(&json!({})), ParamType::String);
        assert_eq!(
            ParamType::of_schema(&json!({"properties": {"a": {}}})),
            ParamType::Object
        );
    }

    #[test]
    fn test_http_method_forms() {
        assert_eq!(HttpMethod::from_key("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::from_key("head"), None);
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert!(HttpMethod::Put.carries_body());
        assert!(!HttpMethod::Delete.carries_body());
    }

    #[test]
    fn test_body_spec_shape() {
        let body = BodySpec {
            content_type: "application/json; charset=utf-8".to_string(),
            required: true,
            description: None,
            schema: json!({
                "type": "object",
                "required": ["name"],
                "properties": {"name": {"type": "string"}, "age": {"type": "integer"}}
            }),
        };
        assert!(body.is_object());
        assert!(body.is_json());
        assert_eq!(body.required_fields(), vec!["name"]);
        assert_eq!(body.properties().unwrap().len(), 2);

        let raw = BodySpec {
            content_type: "text/plain".to_string(),
            required: false,
            description: None,
            schema: json!({"type": "string"}),
        };
        assert!(!raw.is_object());
        assert!(raw.properties().is_none());
        assert!(!raw.is_json());
    }

    #[test]
    fn test_tool_definition_wrapper() {
        let schema = FunctionSchema {
            name: "get_user".to_string(),
            description: "Get user".to_string(),
            parameters: json!({"type": "object", "properties": {}, "required": ["id"]}),
        };
        let def = schema.to_tool_definition();
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "get_user");
        assert_eq!(schema.required(), vec!["id"]);
    }
}
