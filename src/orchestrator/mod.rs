//! Task orchestration: validation, extraction, chunking, prompt dispatch, and result assembly.
//!
//! [`Orchestrator::handle`] is the single entry point shared by the ACP and MCP adapters. It
//! never fails; every error becomes a [`TaskResult`] carrying an [`ErrorBody`].

pub mod chunking;
pub mod dispatch;
mod fold;
pub mod registry;
mod service;
pub mod state;
pub mod tokens;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

pub use chunking::{ChunkingError, TextChunk};
pub use registry::{InFlightRegistry, InFlightStatus};
pub use service::{GenerateOptions, Orchestrator, ServiceStatus, TaskService};
pub use state::RunState;
pub use types::{
    DocumentInfo, DocumentRef, ErrorBody, ErrorKind, ExtractionType, TaskError, TaskKind,
    TaskOutput, TaskParameters, TaskRequest, TaskResult,
};

/// Settings consumed by the orchestrator; derived from [`crate::config::Config`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrchestratorSettings {
    /// Model identifier sent with every completion.
    pub model_id: String,
    /// Maximum characters per chunk.
    pub max_chunk_chars: usize,
    /// Largest accepted document, in bytes.
    pub max_file_size: u64,
    /// Largest accepted document, in pages.
    pub max_pages: usize,
    /// Root of per-request temp areas.
    pub temp_directory: PathBuf,
    /// Summary length used when the caller omits `max_length`.
    pub summary_default_max_length: usize,
    /// Token budget for question-answering context.
    pub qa_token_budget: usize,
    /// tiktoken encoding used for budgets.
    pub token_encoding: String,
    /// Per-call gateway timeout.
    #[serde(serialize_with = "serialize_seconds")]
    pub gateway_timeout: Duration,
    /// Retry budget for transient gateway failures.
    pub gateway_max_retries: u32,
    /// Concurrent chunk calls per request.
    pub gateway_max_concurrency: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            model_id: "ibm-granite/granite-13b-chat-v2".into(),
            max_chunk_chars: 1000,
            max_file_size: 10_485_760,
            max_pages: 100,
            temp_directory: PathBuf::from("./temp"),
            summary_default_max_length: 500,
            qa_token_budget: 3000,
            token_encoding: "cl100k_base".into(),
            gateway_timeout: Duration::from_secs(30),
            gateway_max_retries: 0,
            gateway_max_concurrency: 4,
        }
    }
}

fn serialize_seconds<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}
