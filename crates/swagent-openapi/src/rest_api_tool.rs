//! REST API tool implementation.

use crate::error::CallError;
use crate::executor::Executor;
use crate::result::ExecutionResult;
use crate::types::{Endpoint, FunctionSchema};
use crate::validator::validate;
use serde_json::Value;
use std::sync::Arc;
use swagent_telemetry::{ApiCallSpanAttributes, safe_serialize, trace_api_call};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// A callable operation backed by one endpoint of a contract.
///
/// Each `RestApiTool` pairs an [`Endpoint`] with its [`FunctionSchema`] and
/// the shared [`Executor`]. Calling it runs validation, request building
/// and execution in order.
#[derive(Debug, Clone)]
pub struct RestApiTool {
    endpoint: Arc<Endpoint>,
    schema: FunctionSchema,
    executor: Arc<Executor>,
}

impl RestApiTool {
    pub fn new(endpoint: Arc<Endpoint>, schema: FunctionSchema, executor: Arc<Executor>) -> Self {
        Self {
            endpoint,
            schema,
            executor,
        }
    }

    /// Tool name (the sanitized function name)
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn description(&self) -> &str {
        &self.schema.description
    }

    pub fn schema(&self) -> &FunctionSchema {
        &self.schema
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Validate `args` and execute the call.
    ///
    /// Only validation failures are errors. Everything that happens once a
    /// request is attempted comes back as an [`ExecutionResult`].
    pub async fn execute(&self, args: &Value) -> Result<ExecutionResult, CallError> {
        self.execute_cancellable(args, &CancellationToken::new(), None)
            .await
    }

    /// Like [`execute`](Self::execute), aborting the request when `cancel`
    /// fires. `session_id` is attached to the recorded span.
    #[instrument(skip(self, args, cancel), fields(tool = %self.schema.name))]
    pub async fn execute_cancellable(
        &self,
        args: &Value,
        cancel: &CancellationToken,
        session_id: Option<&str>,
    ) -> Result<ExecutionResult, CallError> {
        debug!("Calling {} with {}", self.endpoint.display_name(), safe_serialize(args));

        let call = validate(&self.endpoint, args).inspect_err(|e| {
            warn!("Rejected call to {}: {}", self.schema.name, e);
        })?;
        let result = self.executor.execute_cancellable(&call, cancel).await;

        trace_api_call(ApiCallSpanAttributes {
            function_name: self.schema.name.clone(),
            method: result.method.clone(),
            url: result.url.clone(),
            status: result.status,
            success: result.success,
            attempts: result.attempts,
            error: result.error.clone(),
            session_id: session_id.map(str::to_string),
        });

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;
    use crate::retry::RetryPolicy;
    use crate::schema::to_function_schema;
    use crate::types::{HttpMethod, ParamType, ParameterLocation, ParameterSpec};
    use serde_json::json;

    fn get_user() -> Arc<Endpoint> {
        Arc::new(Endpoint {
            path: "/users/{id}".to_string(),
            method: HttpMethod::Get,
            operation_id: "getUser".to_string(),
            function_name: "get_user".to_string(),
            summary: Some("Get a user".to_string()),
            description: None,
            parameters: vec![
                ParameterSpec::new("id", ParameterLocation::Path, ParamType::Integer).required(),
            ],
            request_body: None,
            responses: Vec::new(),
        })
    }

    fn tool(base_url: &str) -> RestApiTool {
        let endpoint = get_user();
        let schema = to_function_schema(&endpoint);
        let executor = Executor::new(
            ExecutorConfig::new(base_url).with_retry(RetryPolicy::none()),
        )
        .unwrap();
        RestApiTool::new(endpoint, schema, Arc::new(executor))
    }

    #[test]
    fn test_accessors() {
        let tool = tool("http://127.0.0.1:1");
        assert_eq!(tool.name(), "get_user");
        assert!(tool.description().starts_with("Get a user"));
        assert_eq!(tool.endpoint().path, "/users/{id}");
        assert_eq!(tool.schema().required(), vec!["id"]);
    }

    #[tokio::test]
    async fn test_execute_coerces_and_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 42, "name": "Ann"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = tool(&server.url()).execute(&json!({"id": "42"})).await.unwrap();

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.data, Some(json!({"id": 42, "name": "Ann"})));
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = tool(&server.url()).execute(&json!({})).await.unwrap_err();

        mock.assert_async().await;
        match err {
            CallError::Validation(errors) => assert!(errors.has_field("id")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
