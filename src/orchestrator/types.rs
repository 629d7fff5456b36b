//! Request, result, and error types shared by the orchestrator and its protocol adapters.

use crate::extraction::ExtractedDocument;
use crate::gateway::{GatewayError, TokenUsage};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A task submitted by a protocol adapter.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Caller-supplied identifier; unique among in-flight requests.
    pub request_id: String,
    /// Task name as received on the wire; parsed during validation.
    pub task: String,
    /// Where the document text comes from.
    pub document: DocumentRef,
    /// Task-specific options (a JSON object, or `null` for none).
    pub parameters: Value,
    /// Free-text caller identity.
    pub source: Option<String>,
}

/// Source of the document a task operates on.
#[derive(Clone)]
pub enum DocumentRef {
    /// File already present on the server's filesystem.
    Path(PathBuf),
    /// Bytes received by an adapter; written into a per-request temp area before extraction.
    Upload {
        /// Name the caller gave the file.
        file_name: String,
        /// Raw file contents.
        bytes: Vec<u8>,
    },
    /// Raw text that bypasses extraction.
    Inline {
        /// Document text.
        text: String,
        /// Optional display name.
        label: Option<String>,
    },
}

impl fmt::Debug for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Upload { file_name, bytes } => f
                .debug_struct("Upload")
                .field("file_name", file_name)
                .field("bytes", &bytes.len())
                .finish(),
            Self::Inline { text, label } => f
                .debug_struct("Inline")
                .field("chars", &text.chars().count())
                .field("label", label)
                .finish(),
        }
    }
}

/// The four supported task types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Condense the document.
    Summarize,
    /// Answer a question about the document.
    QuestionAnswer,
    /// Pull a list of items out of the document.
    Extract,
    /// Produce a structured analysis of the document.
    Analyze,
}

impl TaskKind {
    /// Every task type, in table order.
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Summarize,
        TaskKind::QuestionAnswer,
        TaskKind::Extract,
        TaskKind::Analyze,
    ];

    /// Parse a wire task name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "summarize" => Some(Self::Summarize),
            "question_answer" => Some(Self::QuestionAnswer),
            "extract" => Some(Self::Extract),
            "analyze" => Some(Self::Analyze),
            _ => None,
        }
    }

    /// Wire name of the task.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::QuestionAnswer => "question_answer",
            Self::Extract => "extract",
            Self::Analyze => "analyze",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an `extract` task pulls out of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionType {
    /// Main points made by the document.
    KeyPoints,
    /// People, organizations, places, dates.
    Entities,
    /// Tasks or follow-ups the document calls for.
    ActionItems,
}

impl ExtractionType {
    /// Parse a wire extraction type.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "key_points" => Some(Self::KeyPoints),
            "entities" => Some(Self::Entities),
            "action_items" => Some(Self::ActionItems),
            _ => None,
        }
    }

    /// Human-readable phrase used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::KeyPoints => "key points",
            Self::Entities => "named entities (people, organizations, places, dates)",
            Self::ActionItems => "action items",
        }
    }
}

/// Validated, task-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskParameters {
    /// Parameters for [`TaskKind::Summarize`].
    Summarize {
        /// Target summary length, in characters.
        max_length: usize,
    },
    /// Parameters for [`TaskKind::QuestionAnswer`].
    QuestionAnswer {
        /// Non-empty question.
        question: String,
    },
    /// Parameters for [`TaskKind::Extract`].
    Extract {
        /// What to extract.
        extraction_type: ExtractionType,
    },
    /// Parameters for [`TaskKind::Analyze`].
    Analyze {
        /// Optional aspect to emphasize.
        focus: Option<String>,
    },
}

impl TaskParameters {
    /// Task type these parameters belong to.
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Summarize { .. } => TaskKind::Summarize,
            Self::QuestionAnswer { .. } => TaskKind::QuestionAnswer,
            Self::Extract { .. } => TaskKind::Extract,
            Self::Analyze { .. } => TaskKind::Analyze,
        }
    }
}

/// Task-shaped payload of a successful result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskOutput {
    /// Result of a summarize task.
    Summarize {
        /// Final summary.
        summary: String,
        /// Characters in the source text.
        original_length: usize,
        /// Characters in the summary.
        summary_length: usize,
        /// Chunks the document was split into.
        chunk_count: usize,
        /// Model that produced the summary.
        model_id: String,
        /// Tokens used across every call.
        token_usage: TokenUsage,
    },
    /// Result of a question-answering task.
    QuestionAnswer {
        /// Model answer.
        answer: String,
        /// Question that was asked.
        question: String,
        /// Chunks that fit in the context budget.
        chunks_used: usize,
        /// Chunks the document was split into.
        chunks_total: usize,
        /// Model that produced the answer.
        model_id: String,
        /// Tokens used by the call.
        token_usage: TokenUsage,
    },
    /// Result of an extract task.
    Extract {
        /// Extracted items, de-duplicated, in the order the model listed them.
        items: Vec<String>,
        /// What was extracted.
        extraction_type: ExtractionType,
        /// Chunks the document was split into.
        chunk_count: usize,
        /// Model that produced the list.
        model_id: String,
        /// Tokens used across every call.
        token_usage: TokenUsage,
    },
    /// Result of an analyze task.
    Analyze {
        /// Model analysis.
        analysis: String,
        /// Focus the caller asked for, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        focus: Option<String>,
        /// Chunks the document was split into.
        chunk_count: usize,
        /// Model that produced the analysis.
        model_id: String,
        /// Tokens used across every call.
        token_usage: TokenUsage,
    },
}

/// Document details reported alongside a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    /// File name (or label for inline text).
    pub file_name: String,
    /// Pages in the source; `0` for inline text.
    pub page_count: usize,
    /// Source size in bytes.
    pub file_size: u64,
    /// SHA-256 of the source bytes.
    pub fingerprint: String,
    /// Whether some pages could not be read.
    pub degraded: bool,
    /// Pages whose text could not be decoded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreadable_pages: Vec<u32>,
    /// Document metadata.
    pub metadata: BTreeMap<String, String>,
}

impl From<&ExtractedDocument> for DocumentInfo {
    fn from(document: &ExtractedDocument) -> Self {
        Self {
            file_name: document.file_name.clone(),
            page_count: document.page_count,
            file_size: document.file_size,
            fingerprint: document.fingerprint.clone(),
            degraded: document.is_degraded(),
            unreadable_pages: document.unreadable_pages.clone(),
            metadata: document.metadata.clone(),
        }
    }
}

/// Error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing input.
    ValidationError,
    /// The document could not be turned into text.
    ExtractionError,
    /// Another request with the same id is in flight.
    DuplicateRequestError,
    /// The model call failed.
    GatewayError,
    /// Unexpected failure inside the service.
    InternalError,
}

/// Wire form of a task failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Error kind.
    pub kind: ErrorKind,
    /// Caller-facing message.
    pub message: String,
    /// Offending input field, for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Whether the extraction failure was fatal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<bool>,
    /// Whether the gateway failure was a timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<bool>,
}

/// Failures raised while handling a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Input rejected before extraction or dispatch.
    #[error("{message}")]
    Validation {
        /// Offending input field.
        field: String,
        /// What was wrong with it.
        message: String,
    },
    /// The document could not be turned into usable text.
    #[error("{message}")]
    Extraction {
        /// What went wrong.
        message: String,
        /// Whether no usable text remained.
        fatal: bool,
    },
    /// A request with the same id is already running.
    #[error("Request '{0}' is already in flight")]
    Duplicate(String),
    /// The model gateway failed after the retry budget.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Unexpected internal failure; the detail is logged and never sent to callers.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskError {
    /// Build a validation error for `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Error kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::Extraction { .. } => ErrorKind::ExtractionError,
            Self::Duplicate(_) => ErrorKind::DuplicateRequestError,
            Self::Gateway(_) => ErrorKind::GatewayError,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Wire form of the error.
    pub fn to_body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            field: None,
            fatal: None,
            timeout: None,
        };
        match self {
            Self::Validation { field, .. } => body.field = Some(field.clone()),
            Self::Extraction { fatal, .. } => body.fatal = Some(*fatal),
            Self::Gateway(error) => body.timeout = Some(error.is_timeout()),
            Self::Internal(_) => body.message = "Internal error while processing the request".into(),
            Self::Duplicate(_) => {}
        }
        body
    }
}

/// Terminal value returned for every request.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// Identifier from the request.
    pub request_id: String,
    /// Whether the task completed.
    pub success: bool,
    /// Task-shaped payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskOutput>,
    /// Document details, once extraction has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_info: Option<DocumentInfo>,
    /// Wall time from receipt to the terminal state, serialized in seconds.
    #[serde(serialize_with = "serialize_seconds")]
    pub processing_time: Duration,
    /// Structured error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Completion time, RFC 3339 in UTC.
    pub timestamp: String,
    /// Caller identity echoed from the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TaskResult {
    /// Successful result.
    pub fn completed(
        request_id: String,
        output: TaskOutput,
        document_info: Option<DocumentInfo>,
        processing_time: Duration,
        source: Option<String>,
    ) -> Self {
        Self {
            request_id,
            success: true,
            result: Some(output),
            document_info,
            processing_time,
            error: None,
            timestamp: now_rfc3339(),
            source,
        }
    }

    /// Failed result.
    pub fn failed(
        request_id: String,
        error: &TaskError,
        document_info: Option<DocumentInfo>,
        processing_time: Duration,
        source: Option<String>,
    ) -> Self {
        Self {
            request_id,
            success: false,
            result: None,
            document_info,
            processing_time,
            error: Some(error.to_body()),
            timestamp: now_rfc3339(),
            source,
        }
    }

    /// Error kind, when the task failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }
}

fn serialize_seconds<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
