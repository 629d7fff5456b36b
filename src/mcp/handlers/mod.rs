//! Tool handlers for the MCP server.

use crate::orchestrator::{ErrorKind, TaskResult};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod generate;
pub mod metrics;
pub mod process;
pub mod text;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    parse_arguments_value(value)
}

/// Deserialize arguments represented as a JSON value into the target type.
pub(crate) fn parse_arguments_value<T: DeserializeOwned>(value: Value) -> Result<T, McpError> {
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Use the caller's request id, or mint a UUID when it is absent or blank.
pub(crate) fn resolve_request_id(request_id: Option<String>) -> String {
    request_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Turn a task result into a tool result; failures become protocol errors carrying the result.
pub(crate) fn task_result_into_tool_result(result: TaskResult) -> Result<CallToolResult, McpError> {
    let payload = serde_json::to_value(&result)
        .map_err(|err| McpError::internal_error(format!("Failed to encode result: {err}"), None))?;

    let Some(error) = result.error.as_ref() else {
        return Ok(CallToolResult::structured(payload));
    };
    let message = error.message.clone();
    Err(match error.kind {
        ErrorKind::ValidationError | ErrorKind::ExtractionError => {
            McpError::invalid_params(message, Some(payload))
        }
        ErrorKind::DuplicateRequestError => McpError::invalid_request(message, Some(payload)),
        ErrorKind::GatewayError | ErrorKind::InternalError => {
            McpError::internal_error(message, Some(payload))
        }
    })
}
