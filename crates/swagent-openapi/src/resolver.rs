//! Inline resolution of internal `$ref` pointers.

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Return a copy of `document` with every internal `#/...` reference
/// replaced by its target.
///
/// References that point back into a definition currently being expanded
/// are left as `{"$ref": ...}` so recursive schemas terminate. External
/// and dangling references are left untouched.
pub fn resolve_refs(document: &Value) -> Value {
    let mut stack = Vec::new();
    resolve_value(document, document, &mut stack)
}

/// Whether `value` still contains a `$ref` anywhere.
pub fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("$ref") || map.values().any(contains_ref),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

/// First `$ref` in `value` that cannot be followed inside `root`: an
/// external reference or an internal pointer with no target.
pub fn unresolvable_ref<'a>(value: &'a Value, root: &Value) -> Option<&'a str> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                let resolvable = reference
                    .strip_prefix('#')
                    .is_some_and(|pointer| root.pointer(&decode_pointer(pointer)).is_some());
                if !resolvable {
                    return Some(reference);
                }
            }
            map.values().find_map(|v| unresolvable_ref(v, root))
        }
        Value::Array(items) => items.iter().find_map(|v| unresolvable_ref(v, root)),
        _ => None,
    }
}

fn resolve_value(value: &Value, root: &Value, stack: &mut Vec<String>) -> Value {
    match value {
        Value::Object(map) => match map.get("$ref").and_then(Value::as_str) {
            Some(reference) => resolve_reference(reference, map, root, stack),
            None => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), resolve_value(v, root, stack)))
                    .collect(),
            ),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, root, stack))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_reference(
    reference: &str,
    node: &Map<String, Value>,
    root: &Value,
    stack: &mut Vec<String>,
) -> Value {
    let Some(pointer) = reference.strip_prefix('#') else {
        warn!("External reference left unresolved: {}", reference);
        return Value::Object(node.clone());
    };

    if stack.iter().any(|seen| seen == reference) {
        debug!("Recursive reference kept as-is: {}", reference);
        return Value::Object(node.clone());
    }

    let Some(target) = root.pointer(&decode_pointer(pointer)) else {
        warn!("Dangling reference: {}", reference);
        return Value::Object(node.clone());
    };

    stack.push(reference.to_string());
    let mut resolved = resolve_value(target, root, stack);
    stack.pop();

    // Sibling keys next to `$ref` override the target's own keys.
    if let Value::Object(resolved_map) = &mut resolved {
        for (key, sibling) in node.iter().filter(|(k, _)| k.as_str() != "$ref") {
            resolved_map.insert(key.clone(), resolve_value(sibling, root, stack));
        }
    }
    resolved
}

/// Undo URI escaping in a fragment; JSON pointer escapes stay for `pointer()`.
fn decode_pointer(pointer: &str) -> String {
    percent_encoding::percent_decode_str(pointer)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolves_component_schema() {
        let doc = json!({
            "components": {"schemas": {"User": {"type": "object", "properties": {"id": {"type": "integer"}}}}},
            "paths": {"/users": {"post": {"requestBody": {"content": {"application/json": {
                "schema": {"$ref": "#/components/schemas/User"}
            }}}}}}
        });

        let resolved = resolve_refs(&doc);
        let schema = &resolved["paths"]["/users"]["post"]["requestBody"]["content"]["application/json"]["schema"];
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["id"]["type"], "integer");
        assert!(!contains_ref(&resolved["paths"]));
    }

    #[test]
    fn test_recursive_reference_terminates() {
        let doc = json!({
            "components": {"schemas": {"Node": {
                "type": "object",
                "properties": {"child": {"$ref": "#/components/schemas/Node"}}
            }}},
            "root": {"$ref": "#/components/schemas/Node"}
        });

        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["root"]["type"], "object");
        assert_eq!(
            resolved["root"]["properties"]["child"]["$ref"],
            "#/components/schemas/Node"
        );
        assert!(unresolvable_ref(&resolved["root"], &resolved).is_none());
    }

    #[test]
    fn test_external_and_dangling_refs_are_kept() {
        let doc = json!({
            "a": {"$ref": "other.yaml#/Thing"},
            "b": {"$ref": "#/components/schemas/Missing"}
        });

        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["a"]["$ref"], "other.yaml#/Thing");
        assert_eq!(unresolvable_ref(&resolved["a"], &resolved), Some("other.yaml#/Thing"));
        assert_eq!(
            unresolvable_ref(&resolved["b"], &resolved),
            Some("#/components/schemas/Missing")
        );
    }

    #[test]
    fn test_sibling_keys_override_target() {
        let doc = json!({
            "components": {"parameters": {"Limit": {"name": "limit", "in": "query", "description": "Page size"}}},
            "p": {"$ref": "#/components/parameters/Limit", "description": "Max items"}
        });

        let resolved = resolve_refs(&doc);
        assert_eq!(resolved["p"]["name"], "limit");
        assert_eq!(resolved["p"]["description"], "Max items");
    }
}
