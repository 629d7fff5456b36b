//! Handler for the `process-document` tool.

use std::{path::PathBuf, sync::Arc};

use crate::{
    mcp::MCP_SOURCE,
    orchestrator::{DocumentRef, Orchestrator, TaskRequest},
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_arguments, resolve_request_id, task_result_into_tool_result};

/// Request payload for the `process-document` tool.
#[derive(Debug, Deserialize)]
pub(crate) struct ProcessDocumentRequest {
    /// Server-side path of the PDF.
    pub(crate) document_path: String,
    /// Task name (`summarize`, `question_answer`, `extract`, `analyze`).
    pub(crate) task: String,
    /// Task parameters, validated by the orchestrator.
    #[serde(default)]
    pub(crate) parameters: Value,
    /// Optional caller-chosen request id.
    #[serde(default)]
    pub(crate) request_id: Option<String>,
}

/// Run a task over a document the server can read.
pub(crate) async fn handle_process_document(
    orchestrator: &Arc<Orchestrator>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: ProcessDocumentRequest = parse_arguments(arguments)?;
    if args.document_path.trim().is_empty() {
        return Err(McpError::invalid_params(
            "document_path must not be empty",
            None,
        ));
    }

    let request = TaskRequest {
        request_id: resolve_request_id(args.request_id),
        task: args.task,
        document: DocumentRef::Path(PathBuf::from(args.document_path)),
        parameters: args.parameters,
        source: Some(MCP_SOURCE.to_string()),
    };
    task_result_into_tool_result(orchestrator.handle(request).await)
}
