//! OpenAPI toolset container.

use crate::auth::AuthConfig;
use crate::contract::ApiContract;
use crate::error::{CallError, OpenApiError, Result};
use crate::executor::{Executor, ExecutorConfig};
use crate::rest_api_tool::RestApiTool;
use crate::result::ExecutionResult;
use crate::types::FunctionSchema;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use swagent_core::SwagentConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A loaded contract bound to an executor, with one tool per operation.
///
/// The contract is shared read-only; several toolsets (one per session,
/// say) can point at the same `Arc<ApiContract>` with different executors.
///
/// # Example
///
/// ```no_run
/// use swagent_openapi::{ApiContract, AuthConfig, ExecutorConfig, OpenApiToolset};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let contract = Arc::new(ApiContract::from_file("./api/openapi.yaml")?);
/// let toolset = OpenApiToolset::from_contract(
///     contract,
///     ExecutorConfig::new("https://api.example.com")
///         .with_auth(AuthConfig::bearer(std::env::var("API_TOKEN")?)),
/// )?;
///
/// let result = toolset.call("getUser", &serde_json::json!({"id": 42})).await?;
/// println!("{} {}", result.status, result.success);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenApiToolset {
    contract: Arc<ApiContract>,
    executor: Arc<Executor>,
    tools: Vec<RestApiTool>,
}

impl OpenApiToolset {
    /// Bind `contract` to an executor built from `config`.
    pub fn from_contract(contract: Arc<ApiContract>, config: ExecutorConfig) -> Result<Self> {
        let executor = Arc::new(Executor::new(config)?);
        let tools: Vec<RestApiTool> = contract
            .endpoints()
            .iter()
            .zip(contract.function_schemas())
            .map(|(endpoint, schema)| {
                RestApiTool::new(endpoint.clone(), schema.clone(), executor.clone())
            })
            .collect();

        debug!("Generated {} tools against {}", tools.len(), executor.base_url());

        Ok(Self {
            contract,
            executor,
            tools,
        })
    }

    /// Load the configured contract and build the executor from the `[api]`
    /// and `[retry]` sections.
    pub async fn from_config(config: &SwagentConfig) -> Result<Self> {
        let source = config.contract.path.as_deref().ok_or_else(|| {
            OpenApiError::Other("No contract path configured".to_string())
        })?;
        info!("Loading contract from {}", source);

        let contract = ApiContract::load(source, Duration::from_secs(config.api.timeout_secs)).await?;
        let executor_config =
            ExecutorConfig::from_config(&config.api, &config.retry, contract.base_url())?;
        Self::from_contract(Arc::new(contract), executor_config)
    }

    /// Rebuild every tool with `auth` applied.
    pub fn with_auth(self, auth: AuthConfig) -> Result<Self> {
        info!("Configuring authentication for all tools");
        let config = self.executor.config().clone().with_auth(auth);
        Self::from_contract(self.contract, config)
    }

    pub fn tools(&self) -> &[RestApiTool] {
        &self.tools
    }

    pub fn get_tool(&self, name: &str) -> Option<&RestApiTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(RestApiTool::name).collect()
    }

    pub fn function_schemas(&self) -> &[FunctionSchema] {
        self.contract.function_schemas()
    }

    pub fn contract(&self) -> &Arc<ApiContract> {
        &self.contract
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Call the operation named `name` with raw arguments.
    pub async fn call(&self, name: &str, args: &Value) -> std::result::Result<ExecutionResult, CallError> {
        self.call_cancellable(name, args, &CancellationToken::new(), None)
            .await
    }

    pub async fn call_cancellable(
        &self,
        name: &str,
        args: &Value,
        cancel: &CancellationToken,
        session_id: Option<&str>,
    ) -> std::result::Result<ExecutionResult, CallError> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| CallError::UnknownFunction(name.to_string()))?;
        tool.execute_cancellable(args, cancel, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use serde_json::json;

    const TEST_SPEC: &str = r#"
openapi: 3.0.0
info:
  title: Test API
  version: 1.0.0
servers:
  - url: https://api.example.com
paths:
  /users:
    get:
      operationId: listUsers
      summary: List all users
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
            default: 10
      responses:
        '200':
          description: Success
  /users/{id}:
    get:
      operationId: getUser
      summary: Get user by ID
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: Success
"#;

    fn toolset(base_url: &str) -> OpenApiToolset {
        let contract = Arc::new(ApiContract::from_str(TEST_SPEC).unwrap());
        OpenApiToolset::from_contract(
            contract,
            ExecutorConfig::new(base_url).with_retry(RetryPolicy::none()),
        )
        .unwrap()
    }

    #[test]
    fn test_toolset_from_contract() {
        let toolset = toolset("https://api.example.com");
        assert_eq!(toolset.len(), 2);
        assert!(!toolset.is_empty());
        assert_eq!(toolset.tool_names(), vec!["listUsers", "getUser"]);
        assert_eq!(toolset.function_schemas().len(), 2);
    }

    #[test]
    fn test_get_tool_by_name() {
        let toolset = toolset("https://api.example.com");

        let tool = toolset.get_tool("listUsers");
        assert!(tool.is_some());
        assert_eq!(tool.unwrap().name(), "listUsers");

        assert!(toolset.get_tool("nonexistent").is_none());
    }

    #[test]
    fn test_with_auth_keeps_tools() {
        let toolset = toolset("https://api.example.com")
            .with_auth(AuthConfig::bearer("test-token"))
            .unwrap();

        assert_eq!(toolset.len(), 2);
        assert!(matches!(toolset.executor().config().auth, AuthConfig::Bearer { .. }));
    }

    #[tokio::test]
    async fn test_call_injects_defaults() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users")
            .match_query(mockito::Matcher::UrlEncoded("limit".into(), "10".into()))
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let result = toolset(&server.url())
            .call("listUsers", &json!({}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.data, Some(json!([])));
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let err = toolset("http://127.0.0.1:1")
            .call("delete_everything", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, CallError::UnknownFunction("delete_everything".to_string()));
    }

    #[tokio::test]
    async fn test_from_config_uses_contract_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.yaml");
        std::fs::write(&path, TEST_SPEC).unwrap();

        let mut config = SwagentConfig::test_defaults();
        config.contract.path = Some(path.to_string_lossy().into_owned());
        config.api.base_url = None;

        let toolset = OpenApiToolset::from_config(&config).await.unwrap();
        assert_eq!(toolset.executor().base_url(), "https://api.example.com");
        assert_eq!(toolset.len(), 2);
    }
}
