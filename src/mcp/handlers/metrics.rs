//! Handler for the metrics tool.

use std::sync::Arc;

use crate::orchestrator::Orchestrator;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

/// Handle the `metrics` tool, returning request and model-call counters.
pub(crate) async fn handle_metrics(
    orchestrator: &Arc<Orchestrator>,
) -> Result<CallToolResult, McpError> {
    let status = orchestrator.service_status();
    let snapshot = status.metrics;
    Ok(CallToolResult::structured(json!({
        "requestsTotal": snapshot.requests_total,
        "requestsSucceeded": snapshot.requests_succeeded,
        "requestsFailed": snapshot.requests_failed,
        "modelCalls": snapshot.model_calls,
        "chunksProcessed": snapshot.chunks_processed,
        "uptimeSecs": snapshot.uptime_secs,
        "inFlight": status.in_flight,
        "modelId": status.model_id,
    })))
}
