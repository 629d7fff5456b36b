//! Formatting helpers shared across MCP handlers and resources.

use crate::orchestrator::dispatch::{PromptStrategy, TASK_TABLE};
use rmcp::model::ResourceContents;
use schemars::JsonSchema;
use serde::Serialize;

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}

/// Payload of the `capabilities` resource.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct CapabilitiesSnapshot {
    /// Model used for every completion.
    pub(crate) model_id: String,
    /// Supported task types, in table order.
    pub(crate) tasks: Vec<TaskCapability>,
}

/// One supported task type.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct TaskCapability {
    /// Wire name accepted in `task`.
    pub(crate) task: &'static str,
    /// Short description.
    pub(crate) description: &'static str,
    /// Parameters that must be present.
    pub(crate) required_parameters: Vec<&'static str>,
    /// `fold` (per chunk, then combine) or `budgeted` (single call over leading chunks).
    pub(crate) strategy: &'static str,
}

/// Describe the task table for clients.
pub(crate) fn capabilities_snapshot(model_id: &str) -> CapabilitiesSnapshot {
    CapabilitiesSnapshot {
        model_id: model_id.to_string(),
        tasks: TASK_TABLE
            .iter()
            .map(|spec| TaskCapability {
                task: spec.kind.as_str(),
                description: spec.description,
                required_parameters: spec.required_parameters.to_vec(),
                strategy: match spec.strategy {
                    PromptStrategy::Fold => "fold",
                    PromptStrategy::Budgeted => "budgeted",
                },
            })
            .collect(),
    }
}
