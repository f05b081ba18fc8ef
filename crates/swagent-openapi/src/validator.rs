//! Argument validation and coercion.
//!
//! Every declared parameter is coerced through the table in [`COERCIONS`],
//! then checked against its enum and numeric range. Body fields only get a
//! shape check. All problems are collected before returning.

use crate::error::{FieldError, ValidationError};
use crate::types::{BodySpec, Endpoint, ParamType, ParameterSpec, ValidatedCall};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Converts a raw argument into the declared type, or explains why not.
pub type Coercion = fn(&Value) -> Result<Value, String>;

/// Coercion rule per declared type.
pub const COERCIONS: [(ParamType, Coercion); 6] = [
    (ParamType::Integer, coerce_integer),
    (ParamType::Number, coerce_number),
    (ParamType::Boolean, coerce_boolean),
    (ParamType::String, coerce_string),
    (ParamType::Array, coerce_array),
    (ParamType::Object, coerce_object),
];

const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];

pub fn coercion_for(param_type: ParamType) -> Coercion {
    COERCIONS
        .iter()
        .find(|(tag, _)| *tag == param_type)
        .map(|(_, coercion)| *coercion)
        .unwrap_or(coerce_string)
}

/// Validate raw arguments for `endpoint`.
///
/// `Null` is treated as an empty argument map. Arguments that match no
/// declared parameter or body field are dropped.
pub fn validate<'a>(endpoint: &'a Endpoint, raw: &Value) -> Result<ValidatedCall<'a>, ValidationError> {
    let empty = Map::new();
    let args = match raw {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ValidationError {
                errors: vec![FieldError::new(
                    "arguments",
                    format!("expected an object, got {}", other),
                )],
            });
        }
    };

    let mut errors = Vec::new();
    let mut arguments = Map::new();
    let placeholders = endpoint.path_placeholders();

    for param in &endpoint.parameters {
        let required = param.required || placeholders.contains(&param.name.as_str());
        match present(args, &param.name) {
            None => match &param.default {
                Some(default) => {
                    arguments.insert(param.name.clone(), default.clone());
                }
                None if required => {
                    errors.push(FieldError::new(&param.name, "missing required parameter"));
                }
                None => {}
            },
            Some(value) => match check_parameter(param, value) {
                Ok(coerced) => {
                    arguments.insert(param.name.clone(), coerced);
                }
                Err(message) => errors.push(FieldError::new(&param.name, message)),
            },
        }
    }

    if let Some(body) = &endpoint.request_body {
        validate_body(endpoint, body, args, &mut arguments, &mut errors);
    }

    for key in args.keys() {
        if !arguments.contains_key(key) && !is_declared(endpoint, key) {
            debug!(
                "Dropping undeclared argument '{}' for {}",
                key,
                endpoint.display_name()
            );
        }
    }

    if errors.is_empty() {
        Ok(ValidatedCall {
            endpoint,
            arguments,
        })
    } else {
        Err(ValidationError { errors })
    }
}

/// An argument that is set and not `null`.
fn present<'v>(args: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    args.get(name).filter(|v| !v.is_null())
}

fn is_declared(endpoint: &Endpoint, key: &str) -> bool {
    if endpoint.parameter(key).is_some() {
        return true;
    }
    match &endpoint.request_body {
        Some(body) if body.is_object() => body
            .properties()
            .is_some_and(|props| props.contains_key(key)),
        Some(_) => key == "request_body",
        None => false,
    }
}

fn check_parameter(param: &ParameterSpec, value: &Value) -> Result<Value, String> {
    let coerced = coercion_for(param.param_type)(value)?;

    if let Some(allowed) = &param.enum_values
        && !allowed.iter().any(|candidate| values_equal(candidate, &coerced))
    {
        return Err(format!(
            "value {} is not one of {}",
            coerced,
            Value::Array(allowed.clone())
        ));
    }

    if param.param_type.is_numeric()
        && let Some(n) = coerced.as_f64()
    {
        if let Some(min) = &param.minimum
            && min.as_f64().is_some_and(|m| n < m)
        {
            return Err(format!("value {} is less than minimum {}", coerced, min));
        }
        if let Some(max) = &param.maximum
            && max.as_f64().is_some_and(|m| n > m)
        {
            return Err(format!("value {} is greater than maximum {}", coerced, max));
        }
    }

    Ok(coerced)
}

fn validate_body(
    endpoint: &Endpoint,
    body: &BodySpec,
    args: &Map<String, Value>,
    arguments: &mut Map<String, Value>,
    errors: &mut Vec<FieldError>,
) {
    if !body.is_object() {
        match present(args, "request_body") {
            Some(value) => match check_shape(body.body_type(), value) {
                Ok(()) => {
                    arguments.insert("request_body".to_string(), value.clone());
                }
                Err(message) => errors.push(FieldError::new("request_body", message)),
            },
            None if body.required => {
                errors.push(FieldError::new("request_body", "missing required request body"));
            }
            None => {}
        }
        return;
    }

    if let Some(props) = body.properties() {
        for (name, schema) in props {
            if endpoint.parameter(name).is_some() {
                continue;
            }
            if let Some(value) = present(args, name) {
                match check_shape(ParamType::of_schema(schema), value) {
                    Ok(()) => {
                        arguments.insert(name.clone(), value.clone());
                    }
                    Err(message) => errors.push(FieldError::new(name, message)),
                }
            }
        }
    }

    if body.required {
        for field in body.required_fields() {
            if present(args, field).is_none() {
                errors.push(FieldError::new(field, "missing required body field"));
            }
        }
    }
}

/// Loose type check for body fields. The value itself is left unchanged.
fn check_shape(expected: ParamType, value: &Value) -> Result<(), String> {
    let ok = match expected {
        ParamType::Integer => match value {
            Value::Number(_) => as_integer(value).is_some(),
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        ParamType::Number => match value {
            Value::Number(_) => true,
            Value::String(s) => parse_finite(s).is_some(),
            _ => false,
        },
        ParamType::Boolean => match value {
            Value::Bool(_) => true,
            Value::String(s) => ["true", "false", "1", "0"]
                .iter()
                .any(|v| s.trim().eq_ignore_ascii_case(v)),
            _ => false,
        },
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
        ParamType::String => true,
    };

    if ok {
        Ok(())
    } else {
        Err(format!("expected {}, got {}", expected.as_str(), value))
    }
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    let converted = match value {
        Value::Number(_) => as_integer(value),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Value::from)
                .or_else(|| parse_finite(s).and_then(integral))
        }
        _ => None,
    };
    converted.ok_or_else(|| format!("expected integer, got {}", value))
}

fn coerce_number(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            parse_finite(s.trim())
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected number, got {}", value))
        }
        _ => Err(format!("expected number, got {}", value)),
    }
}

fn coerce_boolean(value: &Value) -> Result<Value, String> {
    let b = match value {
        Value::Bool(b) => *b,
        Value::String(s) => TRUTHY.iter().any(|t| s.trim().eq_ignore_ascii_case(t)),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    };
    Ok(Value::Bool(b))
}

fn coerce_string(value: &Value) -> Result<Value, String> {
    Ok(match value {
        Value::String(_) => value.clone(),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    })
}

/// Native arrays, JSON text, comma-separated text, or a single scalar.
fn coerce_array(value: &Value) -> Result<Value, String> {
    match value {
        Value::Array(_) => Ok(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with('[')
                && let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(s)
            {
                return Ok(parsed);
            }
            if s.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            Ok(Value::Array(
                s.split(',')
                    .map(|item| Value::String(item.trim().to_string()))
                    .collect(),
            ))
        }
        Value::Object(_) => Err(format!("expected array, got {}", value)),
        scalar => Ok(Value::Array(vec![scalar.clone()])),
    }
}

fn coerce_object(value: &Value) -> Result<Value, String> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(parsed @ Value::Object(_)) => Ok(parsed),
            _ => Err(format!("expected object, got {}", value)),
        },
        _ => Err(format!("expected object, got {}", value)),
    }
}

fn as_integer(value: &Value) -> Option<Value> {
    if let Some(i) = value.as_i64() {
        return Some(Value::from(i));
    }
    if let Some(u) = value.as_u64() {
        return Some(Value::from(u));
    }
    value.as_f64().and_then(integral)
}

fn integral(f: f64) -> Option<Value> {
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then(|| Value::from(f as i64))
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Equality that treats `1` and `1.0` as the same value.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
