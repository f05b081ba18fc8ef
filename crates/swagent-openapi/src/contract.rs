//! A loaded contract: endpoints plus their function schemas.

use crate::error::{OpenApiError, Result};
use crate::export::ContractExport;
use crate::parser::{OpenApiParser, ParsedContract};
use crate::schema::to_function_schema;
use crate::types::{ApiInfo, Endpoint, FunctionSchema, SkippedOperation};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Immutable index of a contract's operations.
///
/// Built once and shared read-only across callers, typically as
/// `Arc<ApiContract>`.
#[derive(Debug, Clone)]
pub struct ApiContract {
    info: ApiInfo,
    endpoints: Vec<Arc<Endpoint>>,
    function_schemas: Vec<FunctionSchema>,
    skipped: Vec<SkippedOperation>,
    by_name: HashMap<String, usize>,
}

impl ApiContract {
    /// Build the schema table, rejecting function-name collisions.
    pub fn from_parsed(parsed: ParsedContract) -> Result<Self> {
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(parsed.endpoints.len());
        for (index, endpoint) in parsed.endpoints.iter().enumerate() {
            if let Some(&first) = by_name.get(&endpoint.function_name) {
                return Err(OpenApiError::DuplicateFunctionName {
                    name: endpoint.function_name.clone(),
                    first: parsed.endpoints[first].display_name(),
                    second: endpoint.display_name(),
                });
            }
            by_name.insert(endpoint.function_name.clone(), index);
        }

        let function_schemas = parsed.endpoints.iter().map(to_function_schema).collect();

        Ok(Self {
            info: parsed.info,
            endpoints: parsed.endpoints.into_iter().map(Arc::new).collect(),
            function_schemas,
            skipped: parsed.skipped,
            by_name,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading contract from {}", path.display());
        Self::from_parsed(OpenApiParser::from_file(path)?.parse()?)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Self::from_parsed(OpenApiParser::from_str(content)?.parse()?)
    }

    pub fn from_value(document: Value) -> Result<Self> {
        Self::from_parsed(OpenApiParser::from_value(document).parse()?)
    }

    pub async fn from_url(url: &str, timeout: Duration) -> Result<Self> {
        info!("Fetching contract from {}", url);
        Self::from_parsed(OpenApiParser::from_url(url, timeout).await?.parse()?)
    }

    /// Load from a file path or an http(s) URL.
    pub async fn load(source: &str, timeout: Duration) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::from_url(source, timeout).await
        } else {
            Self::from_file(source)
        }
    }

    pub fn info(&self) -> &ApiInfo {
        &self.info
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn function_schemas(&self) -> &[FunctionSchema] {
        &self.function_schemas
    }

    /// Schemas wrapped as `{"type": "function", "function": {...}}`.
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.function_schemas
            .iter()
            .map(FunctionSchema::to_tool_definition)
            .collect()
    }

    /// Operations dropped while loading, with the reason.
    pub fn skipped(&self) -> &[SkippedOperation] {
        &self.skipped
    }

    pub fn endpoint(&self, function_name: &str) -> Option<&Arc<Endpoint>> {
        self.by_name
            .get(function_name)
            .map(|&index| &self.endpoints[index])
    }

    pub fn function_schema(&self, function_name: &str) -> Option<&FunctionSchema> {
        self.by_name
            .get(function_name)
            .map(|&index| &self.function_schemas[index])
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.function_schemas.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// First server URL declared by the contract.
    pub fn base_url(&self) -> Option<&str> {
        self.info.servers.first().map(String::as_str)
    }

    pub fn to_export(&self) -> ContractExport {
        ContractExport {
            api_info: self.info.clone(),
            function_schemas: self.function_schemas.clone(),
            endpoints: self.endpoints.iter().map(|e| e.as_ref().clone()).collect(),
        }
    }

    /// Write `{api_info, function_schemas, endpoints}` as JSON.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_export().write_to(path)
    }
}
