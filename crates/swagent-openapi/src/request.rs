//! Turns validated arguments into a concrete HTTP request.

use crate::types::{HttpMethod, ParameterLocation, ValidatedCall, is_json_content_type};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::{Map, Value};
use tracing::instrument;

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Payload of a prepared request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
    Multipart(Vec<(String, String)>),
    Raw { content_type: String, content: String },
}

/// Method, relative path and parts of a request, before the base URL and
/// authentication are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    /// Path with every placeholder substituted
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// Build the request for a validated call.
///
/// Path parameters are the ones named by a placeholder; the remaining
/// parameters go to the query string, headers or the `Cookie` header by
/// their declared location. Body fields are only attached for methods that
/// carry a body.
#[instrument(skip(call), fields(function = %call.endpoint().function_name))]
pub fn build_request(call: &ValidatedCall<'_>) -> PreparedRequest {
    let endpoint = call.endpoint();
    let args = call.arguments();
    let placeholders = endpoint.path_placeholders();

    let mut path = endpoint.path.clone();
    for name in &placeholders {
        if let Some(value) = args.get(*name) {
            let encoded = utf8_percent_encode(&scalar_text(value), PATH_SEGMENT).to_string();
            path = path.replace(&format!("{{{}}}", name), &encoded);
        }
    }

    let mut query = Vec::new();
    let mut headers = Vec::new();
    let mut cookies = Vec::new();
    for param in &endpoint.parameters {
        if placeholders.contains(&param.name.as_str()) {
            continue;
        }
        let Some(value) = args.get(&param.name) else {
            continue;
        };
        match param.location {
            ParameterLocation::Header => headers.push((param.name.clone(), scalar_text(value))),
            ParameterLocation::Cookie => cookies.push(format!("{}={}", param.name, scalar_text(value))),
            ParameterLocation::Query | ParameterLocation::Path => match value {
                Value::Array(items) => {
                    query.extend(items.iter().map(|item| (param.name.clone(), scalar_text(item))))
                }
                other => query.push((param.name.clone(), scalar_text(other))),
            },
        }
    }
    if !cookies.is_empty() {
        headers.push(("Cookie".to_string(), cookies.join("; ")));
    }

    let body = match &endpoint.request_body {
        Some(spec) if endpoint.method.carries_body() => {
            let payload = if spec.is_object() {
                let fields: Map<String, Value> = spec
                    .properties()
                    .map(|props| {
                        props
                            .keys()
                            .filter_map(|k| args.get(k).map(|v| (k.clone(), v.clone())))
                            .collect()
                    })
                    .unwrap_or_default();
                (!fields.is_empty()).then_some(Value::Object(fields))
            } else {
                args.get("request_body").cloned()
            };
            payload.map(|payload| encode_body(&spec.content_type, payload))
        }
        _ => None,
    };

    PreparedRequest {
        method: endpoint.method,
        path,
        query,
        headers,
        body,
    }
}

fn encode_body(content_type: &str, payload: Value) -> RequestBody {
    if is_json_content_type(content_type) {
        return RequestBody::Json(payload);
    }

    match payload {
        Value::Object(map) => {
            let pairs = map
                .iter()
                .map(|(k, v)| (k.clone(), scalar_text(v)))
                .collect();
            if content_type.starts_with("multipart/") {
                RequestBody::Multipart(pairs)
            } else {
                RequestBody::Form(pairs)
            }
        }
        other => RequestBody::Raw {
            content_type: content_type.to_string(),
            content: scalar_text(&other),
        },
    }
}

/// Text form of a value as it appears in a URL, header or form field.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BodySpec, Endpoint, ParamType, ParameterSpec};
    use crate::validator::validate;
    use serde_json::json;

    fn endpoint(path: &str, method: HttpMethod) -> Endpoint {
        Endpoint {
            path: path.to_string(),
            method,
            operation_id: "op".to_string(),
            function_name: "op".to_string(),
            summary: None,
            description: None,
            parameters: Vec::new(),
            request_body: None,
            responses: Vec::new(),
        }
    }

    #[test]
    fn test_path_substitution_without_query_or_body() {
        let mut ep = endpoint("/users/{id}", HttpMethod::Get);
        ep.parameters
            .push(ParameterSpec::new("id", ParameterLocation::Path, ParamType::Integer).required());

        let call = validate(&ep, &json!({"id": 42})).unwrap();
        let request = build_request(&call);
        assert_eq!(request.path, "/users/42");
        assert!(request.query.is_empty());
        assert!(request.body.is_none());
    }

    #[test]
    fn test_path_values_are_encoded() {
        let mut ep = endpoint("/files/{name}", HttpMethod::Get);
        ep.parameters
            .push(ParameterSpec::new("name", ParameterLocation::Path, ParamType::String));

        let call = validate(&ep, &json!({"name": "a b/c"})).unwrap();
        assert_eq!(build_request(&call).path, "/files/a%20b%2Fc");
    }

    #[test]
    fn test_query_header_and_cookie_placement() {
        let mut ep = endpoint("/search", HttpMethod::Get);
        ep.parameters.extend([
            ParameterSpec::new("tag", ParameterLocation::Query, ParamType::Array),
            ParameterSpec::new("X-Request-Id", ParameterLocation::Header, ParamType::String),
            ParameterSpec::new("session", ParameterLocation::Cookie, ParamType::String),
            ParameterSpec::new("lang", ParameterLocation::Cookie, ParamType::String),
        ]);

        let call = validate(
            &ep,
            &json!({"tag": "a,b", "X-Request-Id": "r1", "session": "s", "lang": "en"}),
        )
        .unwrap();
        let request = build_request(&call);

        assert_eq!(
            request.query,
            vec![
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string())
            ]
        );
        assert_eq!(
            request.headers,
            vec![
                ("X-Request-Id".to_string(), "r1".to_string()),
                ("Cookie".to_string(), "session=s; lang=en".to_string())
            ]
        );
    }

    #[test]
    fn test_json_body_holds_only_body_fields() {
        let mut ep = endpoint("/users/{id}", HttpMethod::Put);
        ep.parameters
            .push(ParameterSpec::new("id", ParameterLocation::Path, ParamType::Integer));
        ep.request_body = Some(BodySpec {
            content_type: "application/json".to_string(),
            required: true,
            description: None,
            schema: json!({"type": "object", "properties": {"name": {"type": "string"}, "age": {"type": "integer"}}}),
        });

        let call = validate(&ep, &json!({"id": 1, "name": "Ann"})).unwrap();
        let request = build_request(&call);
        assert_eq!(request.path, "/users/1");
        assert_eq!(request.body, Some(RequestBody::Json(json!({"name": "Ann"}))));
    }

    #[test]
    fn test_form_multipart_and_raw_bodies() {
        let object_schema = json!({"type": "object", "properties": {"user": {"type": "string"}, "remember": {"type": "boolean"}}});

        let mut form = endpoint("/login", HttpMethod::Post);
        form.request_body = Some(BodySpec {
            content_type: "application/x-www-form-urlencoded".to_string(),
            required: false,
            description: None,
            schema: object_schema.clone(),
        });
        let call = validate(&form, &json!({"user": "ann", "remember": true})).unwrap();
        assert_eq!(
            build_request(&call).body,
            Some(RequestBody::Form(vec![
                ("user".to_string(), "ann".to_string()),
                ("remember".to_string(), "true".to_string())
            ]))
        );

        let mut upload = endpoint("/upload", HttpMethod::Post);
        upload.request_body = Some(BodySpec {
            content_type: "multipart/form-data".to_string(),
            required: false,
            description: None,
            schema: object_schema,
        });
        let call = validate(&upload, &json!({"user": "ann"})).unwrap();
        assert!(matches!(build_request(&call).body, Some(RequestBody::Multipart(_))));

        let mut note = endpoint("/notes", HttpMethod::Post);
        note.request_body = Some(BodySpec {
            content_type: "text/plain".to_string(),
            required: true,
            description: None,
            schema: json!({"type": "string"}),
        });
        let call = validate(&note, &json!({"request_body": "hi"})).unwrap();
        assert_eq!(
            build_request(&call).body,
            Some(RequestBody::Raw {
                content_type: "text/plain".to_string(),
                content: "hi".to_string()
            })
        );
    }

    #[test]
    fn test_no_body_for_methods_without_one() {
        let mut ep = endpoint("/items", HttpMethod::Delete);
        ep.request_body = Some(BodySpec {
            content_type: "application/json".to_string(),
            required: false,
            description: None,
            schema: json!({"type": "object", "properties": {"reason": {"type": "string"}}}),
        });

        let call = validate(&ep, &json!({"reason": "spam"})).unwrap();
        assert!(build_request(&call).body.is_none());
    }
}
