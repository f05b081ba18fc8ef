//! Error types for contract loading, validation and calls.

use std::fmt;
use thiserror::Error;

/// Result type for OpenAPI operations.
pub type Result<T> = std::result::Result<T, OpenApiError>;

/// Errors that can occur while loading a contract.
///
/// Contract-level variants abort loading. Operation-level variants are
/// logged by the parser and the offending operation is skipped.
#[derive(Error, Debug)]
pub enum OpenApiError {
    /// The document could not be parsed at all
    #[error("Failed to parse OpenAPI spec: {0}")]
    ParseError(String),

    /// The document parsed but is not a usable contract
    #[error("Invalid OpenAPI spec: {0}")]
    InvalidSpec(String),

    /// Two operations sanitize to the same function name
    #[error("Function name '{name}' is produced by both {first} and {second}")]
    DuplicateFunctionName {
        name: String,
        first: String,
        second: String,
    },

    /// A single operation is malformed
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A `$ref` could not be resolved to an inline definition
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A `{name}` path placeholder has no matching parameter
    #[error("Path placeholder '{{{0}}}' has no matching parameter")]
    UnresolvedPlaceholder(String),

    /// Two parameters share a name within one operation
    #[error("Duplicate parameter '{0}'")]
    DuplicateParameter(String),

    /// A request body property shadows a declared parameter
    #[error("Request body property '{0}' conflicts with a parameter of the same name")]
    ParameterConflict(String),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl OpenApiError {
    /// Whether this error aborts loading the whole contract.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            OpenApiError::InvalidOperation(_)
                | OpenApiError::UnresolvedReference(_)
                | OpenApiError::UnresolvedPlaceholder(_)
                | OpenApiError::DuplicateParameter(_)
                | OpenApiError::ParameterConflict(_)
        )
    }
}

/// A problem with a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Parameter or body field name
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every field problem found while validating one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Names of the offending fields, in the order they were found.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// Whether any error concerns the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter validation failed: ")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Why a call never reached the network.
///
/// Transport and upstream failures are not errors; they come back as an
/// `ExecutionResult` with `success == false`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("Function '{0}' not found in OpenAPI spec")]
    UnknownFunction(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_field() {
        let err = ValidationError {
            errors: vec![
                FieldError::new("id", "missing required parameter"),
                FieldError::new("limit", "value 500 is greater than maximum 100"),
            ],
        };

        assert_eq!(err.fields(), vec!["id", "limit"]);
        assert!(err.has_field("limit"));
        assert_eq!(
            err.to_string(),
            "Parameter validation failed: id: missing required parameter; limit: value 500 is greater than maximum 100"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(OpenApiError::ParseError("bad".into()).is_fatal());
        assert!(
            OpenApiError::DuplicateFunctionName {
                name: "get_users".into(),
                first: "GET /users".into(),
                second: "GET /users/".into(),
            }
            .is_fatal()
        );
        assert!(!OpenApiError::ParameterConflict("name".into()).is_fatal());
        assert!(!OpenApiError::UnresolvedPlaceholder("id".into()).is_fatal());
    }

    #[test]
    fn test_placeholder_message_keeps_braces() {
        let err = OpenApiError::UnresolvedPlaceholder("id".into());
        assert_eq!(err.to_string(), "Path placeholder '{id}' has no matching parameter");
    }
}
