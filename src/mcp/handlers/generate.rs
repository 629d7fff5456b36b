//! Handler for the `generate` tool.

use std::sync::Arc;

use crate::orchestrator::{ErrorKind, GenerateOptions, Orchestrator, TaskError};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::json;

use super::parse_arguments;

/// Request payload for the `generate` tool.
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateRequest {
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) max_tokens: Option<u32>,
    #[serde(default)]
    pub(crate) temperature: Option<f32>,
}

/// Send a raw prompt to the model through the call policy.
pub(crate) async fn handle_generate(
    orchestrator: &Arc<Orchestrator>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: GenerateRequest = parse_arguments(arguments)?;
    if args
        .temperature
        .is_some_and(|temperature| !(0.0..=2.0).contains(&temperature))
    {
        return Err(McpError::invalid_params(
            "temperature must be between 0 and 2",
            None,
        ));
    }
    if args.max_tokens == Some(0) {
        return Err(McpError::invalid_params(
            "max_tokens must be greater than zero",
            None,
        ));
    }

    let options = GenerateOptions {
        max_tokens: args.max_tokens,
        temperature: args.temperature,
    };
    let result = orchestrator
        .generate(&args.prompt, options)
        .await
        .map_err(map_generate_error)?;

    Ok(CallToolResult::structured(json!({
        "text": result.text,
        "model_id": result.model_id,
        "token_usage": result.token_usage,
    })))
}

fn map_generate_error(error: TaskError) -> McpError {
    let body = error.to_body();
    let data = serde_json::to_value(&body).ok();
    match body.kind {
        ErrorKind::ValidationError | ErrorKind::ExtractionError => {
            McpError::invalid_params(body.message, data)
        }
        ErrorKind::DuplicateRequestError => McpError::invalid_request(body.message, data),
        ErrorKind::GatewayError | ErrorKind::InternalError => {
            if let TaskError::Internal(detail) = &error {
                tracing::error!(detail = %detail, "Generate failed with internal error");
            }
            McpError::internal_error(body.message, data)
        }
    }
}
