//! Handlers for the inline-text task tools.
//!
//! Each tool runs the regular pipeline over caller-supplied text instead of a PDF; the
//! remaining arguments become the task's parameters and are validated by the orchestrator.

use std::sync::Arc;

use crate::{
    mcp::MCP_SOURCE,
    orchestrator::{DocumentRef, Orchestrator, TaskKind, TaskRequest},
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{parse_arguments, resolve_request_id, task_result_into_tool_result};

/// Arguments shared by the text tools; everything else is a task parameter.
#[derive(Debug, Deserialize)]
pub(crate) struct TextTaskRequest {
    /// Text to process.
    pub(crate) text: String,
    /// Name reported as the document's file name.
    #[serde(default)]
    pub(crate) label: Option<String>,
    /// Optional caller-chosen request id.
    #[serde(default)]
    pub(crate) request_id: Option<String>,
    #[serde(flatten)]
    pub(crate) parameters: Map<String, Value>,
}

/// Run `kind` over the `text` argument.
pub(crate) async fn handle_text_task(
    orchestrator: &Arc<Orchestrator>,
    kind: TaskKind,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: TextTaskRequest = parse_arguments(arguments)?;
    let request = TaskRequest {
        request_id: resolve_request_id(args.request_id),
        task: kind.as_str().to_string(),
        document: DocumentRef::Inline {
            text: args.text,
            label: args.label,
        },
        parameters: Value::Object(args.parameters),
        source: Some(MCP_SOURCE.to_string()),
    };
    task_result_into_tool_result(orchestrator.handle(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handlers::parse_arguments_value;
    use serde_json::json;

    #[test]
    fn unknown_fields_are_kept_as_parameters() {
        let args: TextTaskRequest = parse_arguments_value(json!({
            "text": "Some text.",
            "question": "What?",
            "request_id": "abc"
        }))
        .expect("valid arguments");
        assert_eq!(args.request_id.as_deref(), Some("abc"));
        assert_eq!(args.parameters.get("question"), Some(&json!("What?")));
        assert!(!args.parameters.contains_key("text"));
    }

    #[test]
    fn missing_text_is_rejected() {
        let err = parse_arguments_value::<TextTaskRequest>(json!({ "question": "What?" }))
            .expect_err("text is required");
        assert!(err.message.contains("Invalid arguments"));
    }
}
