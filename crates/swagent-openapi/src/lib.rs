//! # swagent OpenAPI pipeline
//!
//! Turns an OpenAPI/Swagger contract into callable operations.
//!
//! ## Features
//!
//! - Parse OpenAPI v3 and Swagger 2.0 contracts (JSON and YAML), resolving
//!   internal `$ref`s
//! - Generate a function schema per operation for a function-selection model
//! - Validate and coerce raw arguments, collecting every field error
//! - Build and execute HTTP requests with an inspectable retry policy
//! - Normalize every outcome into an [`ExecutionResult`]
//! - Export the contract index to JSON
//!
//! ## Example
//!
//! ```no_run
//! use swagent_openapi::{ApiContract, AuthConfig, ExecutorConfig, OpenApiToolset};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let contract = Arc::new(ApiContract::from_file("./api/openapi.yaml")?);
//! for schema in contract.function_schemas() {
//!     println!("{}: {}", schema.name, schema.description);
//! }
//!
//! let toolset = OpenApiToolset::from_contract(
//!     contract,
//!     ExecutorConfig::new("https://api.example.com")
//!         .with_auth(AuthConfig::api_key_header("X-API-Key", std::env::var("API_KEY")?)),
//! )?;
//! let result = toolset.call("listUsers", &serde_json::json!({"limit": "5"})).await?;
//! println!("HTTP {}", result.status);
//! # Ok(())
//! # }
//! ```

mod auth;
mod contract;
mod error;
mod executor;
mod export;
mod parser;
mod request;
mod resolver;
mod rest_api_tool;
mod result;
mod retry;
mod schema;
mod toolset;
mod types;
mod validator;

pub use auth::AuthConfig;
pub use contract::ApiContract;
pub use error::{CallError, FieldError, OpenApiError, Result, ValidationError};
pub use executor::{Executor, ExecutorConfig, default_user_agent};
pub use export::ContractExport;
pub use parser::{OpenApiParser, ParsedContract};
pub use request::{PreparedRequest, RequestBody, build_request};
pub use resolver::{contains_ref, resolve_refs};
pub use rest_api_tool::RestApiTool;
pub use result::{ExecutionResult, TransportFailure};
pub use retry::{Backoff, DEFAULT_RETRY_STATUSES, RetryPolicy};
pub use schema::{
    convert_schema, default_operation_id, function_description, sanitize_function_name,
    to_function_schema,
};
pub use toolset::OpenApiToolset;
pub use types::{
    ApiInfo, BodySpec, Endpoint, FunctionSchema, HttpMethod, ParamType, ParameterLocation,
    ParameterSpec, ResponseSpec, SkippedOperation, ValidatedCall,
};
pub use validator::{COERCIONS, Coercion, coercion_for, validate};
