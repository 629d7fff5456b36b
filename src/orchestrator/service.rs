//! Orchestrator service coordinating extraction, chunking, and model dispatch per request.

use super::chunking;
use super::dispatch::{self, ParameterDefaults};
use super::fold::{self, DispatchContext};
use super::registry::{InFlightGuard, InFlightRegistry, InFlightStatus};
use super::state::{RunState, TransitionError};
use super::tokens::{TokenCounter, build_token_counter};
use super::types::{
    DocumentInfo, DocumentRef, TaskError, TaskKind, TaskOutput, TaskRequest, TaskResult,
};
use super::OrchestratorSettings;
use crate::config::Config;
use crate::extraction::{
    DocumentExtractor, ExtractedDocument, ExtractionConstraints, ExtractionError, PdfExtractor,
};
use crate::gateway::{
    CallPolicy, CompletionOptions, GatewayError, ModelCallResult, ModelGateway, WatsonxGateway,
};
use crate::metrics::{MetricsSnapshot, TaskMetrics};
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

const DEFAULT_GENERATE_MAX_TOKENS: u32 = 2048;
const DEFAULT_GENERATE_TEMPERATURE: f32 = 0.7;

/// Overrides accepted by [`Orchestrator::generate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Generated-token limit; defaults to 2048.
    pub max_tokens: Option<u32>,
    /// Sampling temperature; defaults to 0.7.
    pub temperature: Option<f32>,
}

/// Service-level status reported by the adapters.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Counters since start.
    pub metrics: MetricsSnapshot,
    /// Requests currently being handled.
    pub in_flight: usize,
    /// Model used for completions.
    pub model_id: String,
}

/// Abstraction over the orchestrator used by the HTTP surface.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Run a task to completion; failures are reported inside the result.
    async fn handle(&self, request: TaskRequest) -> TaskResult;

    /// State of an in-flight request, if any.
    fn task_status(&self, request_id: &str) -> Option<InFlightStatus>;

    /// Counters and configuration summary.
    fn service_status(&self) -> ServiceStatus;
}

/// Owns the request lifecycle for both protocol adapters.
///
/// Collaborators are injected at construction; the only state shared between requests is the
/// in-flight registry and the metrics counters. Construct once and share through an `Arc`.
pub struct Orchestrator {
    extractor: Arc<dyn DocumentExtractor>,
    gateway: Arc<dyn ModelGateway>,
    settings: OrchestratorSettings,
    registry: Arc<InFlightRegistry>,
    metrics: Arc<TaskMetrics>,
    token_counter: TokenCounter,
}

/// Document ready for extraction. Holding `_workspace` keeps an upload's temp area alive.
enum PreparedDocument {
    File {
        path: PathBuf,
        _workspace: Option<TempDir>,
    },
    Inline {
        text: String,
        label: String,
    },
}

impl Orchestrator {
    /// Build an orchestrator around the given collaborators.
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        gateway: Arc<dyn ModelGateway>,
        settings: OrchestratorSettings,
    ) -> Self {
        let token_counter = build_token_counter(&settings.token_encoding);
        Self {
            extractor,
            gateway,
            settings,
            registry: Arc::new(InFlightRegistry::new()),
            metrics: Arc::new(TaskMetrics::new()),
            token_counter,
        }
    }

    /// Wire the production collaborators: lopdf extraction and the watsonx.ai gateway.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let gateway = WatsonxGateway::from_config(config)?;
        Ok(Self::new(
            Arc::new(PdfExtractor::new()),
            Arc::new(gateway),
            config.orchestrator_settings(),
        ))
    }

    /// Effective settings.
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn call_policy(&self) -> CallPolicy {
        CallPolicy::new(self.settings.gateway_timeout, self.settings.gateway_max_retries)
    }

    /// Handle one task request end to end.
    pub async fn handle(&self, request: TaskRequest) -> TaskResult {
        let started = Instant::now();
        let request_id = request.request_id.clone();
        let source = request.source.clone();
        let task = request.task.clone();

        let mut document_info = None;
        let outcome = self.run(request, &mut document_info).await;
        let elapsed = started.elapsed();
        self.metrics.record_request(outcome.is_ok());

        match outcome {
            Ok(output) => {
                tracing::info!(
                    request_id = %request_id,
                    task = %task,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Task completed"
                );
                TaskResult::completed(request_id, output, document_info, elapsed, source)
            }
            Err(error) => {
                match &error {
                    TaskError::Internal(detail) => tracing::error!(
                        request_id = %request_id,
                        task = %task,
                        detail = %detail,
                        "Task failed with internal error"
                    ),
                    other => tracing::info!(
                        request_id = %request_id,
                        task = %task,
                        kind = ?other.kind(),
                        error = %other,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Task failed"
                    ),
                }
                TaskResult::failed(request_id, &error, document_info, elapsed, source)
            }
        }
    }

    async fn run(
        &self,
        request: TaskRequest,
        document_info: &mut Option<DocumentInfo>,
    ) -> Result<TaskOutput, TaskError> {
        if request.request_id.trim().is_empty() {
            return Err(TaskError::validation(
                "request_id",
                "request_id must not be empty",
            ));
        }
        let mut guard = self
            .registry
            .try_insert(&request.request_id, &request.task)
            .ok_or_else(|| TaskError::Duplicate(request.request_id.clone()))?;

        let request_id = request.request_id.clone();
        let outcome = self.drive(&mut guard, request, document_info).await;
        match outcome {
            Ok(output) => {
                guard.advance(RunState::Completed)?;
                Ok(output)
            }
            Err(error) => {
                tracing::debug!(
                    request_id = %request_id,
                    failed_after = %guard.state(),
                    "Request stopped before completion"
                );
                if let Err(transition) = guard.advance(RunState::Errored) {
                    tracing::error!(error = %transition, "Failed to record errored state");
                }
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        guard: &mut InFlightGuard,
        request: TaskRequest,
        document_info: &mut Option<DocumentInfo>,
    ) -> Result<TaskOutput, TaskError> {
        let kind = TaskKind::parse(&request.task).ok_or_else(|| {
            TaskError::validation(
                "task",
                format!(
                    "unknown task '{}'; expected one of summarize, question_answer, extract, analyze",
                    request.task
                ),
            )
        })?;
        let spec = dispatch::lookup(kind);
        let parameters = dispatch::validate_parameters(
            spec,
            &request.parameters,
            &ParameterDefaults {
                summary_max_length: self.settings.summary_default_max_length,
            },
        )?;
        if parameters.kind() != kind {
            return Err(TaskError::Internal(format!(
                "parameters for {} validated as {}",
                kind,
                parameters.kind()
            )));
        }
        // Dropping `prepared` deletes any temp area on every exit path below.
        let prepared = self.prepare(request.document).await?;
        guard.advance(RunState::Validated)?;

        let document = self.extract(&prepared).await?;
        *document_info = Some(DocumentInfo::from(&document));
        if !document.has_text() {
            return Err(TaskError::Extraction {
                message: format!("No extractable text in '{}'", document.file_name),
                fatal: true,
            });
        }
        if document.is_degraded() {
            tracing::warn!(
                request_id = %request.request_id,
                file = %document.file_name,
                unreadable_pages = ?document.unreadable_pages,
                "Continuing with partially extracted document"
            );
        }
        guard.advance(RunState::Extracted)?;

        let chunks = chunking::split(&document.text, self.settings.max_chunk_chars)
            .map_err(|error| TaskError::Internal(error.to_string()))?;
        self.metrics.record_chunks(chunks.len() as u64);
        guard.advance(RunState::Chunked)?;
        tracing::debug!(
            request_id = %request.request_id,
            task = %kind,
            chunk_count = chunks.len(),
            strategy = ?spec.strategy,
            "Document chunked"
        );

        let context = DispatchContext {
            gateway: self.gateway.as_ref(),
            policy: self.call_policy(),
            options: CompletionOptions {
                max_tokens: spec.max_tokens_for(&parameters),
                temperature: spec.temperature,
                model_id: self.settings.model_id.clone(),
            },
            metrics: &self.metrics,
            max_concurrency: self.settings.gateway_max_concurrency,
            qa_token_budget: self.settings.qa_token_budget,
            token_counter: &self.token_counter,
        };
        guard.advance(RunState::Dispatched)?;
        let completion = fold::execute(
            &context,
            spec,
            &parameters,
            &chunks,
            document.text.chars().count(),
        )
        .await?;

        drop(prepared);
        Ok((spec.shape)(&parameters, completion))
    }

    /// Validate the document reference and materialize uploads; nothing is parsed yet.
    async fn prepare(&self, document: DocumentRef) -> Result<PreparedDocument, TaskError> {
        let limit = self.settings.max_file_size;
        match document {
            DocumentRef::Path(path) => {
                let metadata = tokio::fs::metadata(&path)
                    .await
                    .ok()
                    .filter(|metadata| metadata.is_file())
                    .ok_or_else(|| {
                        TaskError::validation(
                            "document",
                            format!("'{}' is not a readable file", path.display()),
                        )
                    })?;
                ensure_within_limit(metadata.len(), limit)?;
                Ok(PreparedDocument::File {
                    path,
                    _workspace: None,
                })
            }
            DocumentRef::Upload { file_name, bytes } => {
                let file_name = Path::new(&file_name)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| {
                        TaskError::validation("document", "uploaded file needs a file name")
                    })?;
                if bytes.is_empty() {
                    return Err(TaskError::validation("document", "uploaded file is empty"));
                }
                ensure_within_limit(bytes.len() as u64, limit)?;

                let workspace = self.create_workspace().await?;
                let path = workspace.path().join(&file_name);
                tokio::fs::write(&path, &bytes).await.map_err(|error| {
                    TaskError::Internal(format!("failed to stage upload: {error}"))
                })?;
                Ok(PreparedDocument::File {
                    path,
                    _workspace: Some(workspace),
                })
            }
            DocumentRef::Inline { text, label } => {
                if text.trim().is_empty() {
                    return Err(TaskError::validation("text", "text must not be empty"));
                }
                ensure_within_limit(text.len() as u64, limit)?;
                Ok(PreparedDocument::Inline {
                    text,
                    label: label.unwrap_or_else(|| "inline-text".to_string()),
                })
            }
        }
    }

    async fn create_workspace(&self) -> Result<TempDir, TaskError> {
        let root = &self.settings.temp_directory;
        tokio::fs::create_dir_all(root).await.map_err(|error| {
            TaskError::Internal(format!(
                "failed to create temp directory {}: {error}",
                root.display()
            ))
        })?;
        tempfile::Builder::new()
            .prefix("docrelay-")
            .tempdir_in(root)
            .map_err(|error| TaskError::Internal(format!("failed to create request workspace: {error}")))
    }

    async fn extract(&self, prepared: &PreparedDocument) -> Result<ExtractedDocument, TaskError> {
        match prepared {
            PreparedDocument::File { path, .. } => {
                let constraints = ExtractionConstraints {
                    max_pages: self.settings.max_pages,
                    max_file_size: self.settings.max_file_size,
                };
                self.extractor
                    .extract(path, &constraints)
                    .await
                    .map_err(map_extraction_error)
            }
            PreparedDocument::Inline { text, label } => Ok(ExtractedDocument {
                text: text.clone(),
                page_count: 0,
                file_name: label.clone(),
                file_size: text.len() as u64,
                fingerprint: hex::encode(Sha256::digest(text.as_bytes())),
                ..ExtractedDocument::default()
            }),
        }
    }

    /// Send a raw prompt through the call policy.
    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<ModelCallResult, TaskError> {
        if prompt.trim().is_empty() {
            return Err(TaskError::validation("prompt", "prompt must not be empty"));
        }
        let options = CompletionOptions {
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_GENERATE_MAX_TOKENS),
            temperature: options.temperature.unwrap_or(DEFAULT_GENERATE_TEMPERATURE),
            model_id: self.settings.model_id.clone(),
        };
        self.call_policy()
            .complete(self.gateway.as_ref(), prompt, &options, &self.metrics)
            .await
            .map_err(TaskError::from)
    }

    /// State of an in-flight request.
    pub fn task_status(&self, request_id: &str) -> Option<InFlightStatus> {
        self.registry.status(request_id)
    }

    /// Counters plus in-flight count and model.
    pub fn service_status(&self) -> ServiceStatus {
        ServiceStatus {
            metrics: self.metrics.snapshot(),
            in_flight: self.registry.len(),
            model_id: self.settings.model_id.clone(),
        }
    }
}

#[async_trait]
impl TaskService for Orchestrator {
    async fn handle(&self, request: TaskRequest) -> TaskResult {
        Orchestrator::handle(self, request).await
    }

    fn task_status(&self, request_id: &str) -> Option<InFlightStatus> {
        Orchestrator::task_status(self, request_id)
    }

    fn service_status(&self) -> ServiceStatus {
        Orchestrator::service_status(self)
    }
}

impl From<TransitionError> for TaskError {
    fn from(error: TransitionError) -> Self {
        TaskError::Internal(error.to_string())
    }
}

fn ensure_within_limit(size: u64, limit: u64) -> Result<(), TaskError> {
    if size > limit {
        return Err(TaskError::validation(
            "document",
            format!("document is {size} bytes; the limit is {limit} bytes"),
        ));
    }
    Ok(())
}

fn map_extraction_error(error: ExtractionError) -> TaskError {
    match error {
        ExtractionError::NotFound(_)
        | ExtractionError::FileTooLarge { .. }
        | ExtractionError::PageLimitExceeded { .. } => {
            TaskError::validation("document", error.to_string())
        }
        ExtractionError::UnsupportedFormat(_)
        | ExtractionError::Corrupt(_)
        | ExtractionError::Io(_) => TaskError::Extraction {
            message: error.to_string(),
            fatal: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, TokenUsage};
    use crate::orchestrator::types::ErrorKind;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const THREE_SECTIONS: &str = "ALPHA section text here.\n\n\
        BRAVO section text here.\n\n\
        CHARLIE section text here.";

    struct FakeExtractor {
        text: String,
        unreadable_pages: Vec<u32>,
        calls: AtomicUsize,
        seen_paths: Mutex<Vec<PathBuf>>,
        delay: Duration,
        fail_with: Option<fn() -> ExtractionError>,
    }

    impl FakeExtractor {
        fn with_text(text: &str) -> Self {
            Self {
                text: text.to_string(),
                unreadable_pages: Vec::new(),
                calls: AtomicUsize::new(0),
                seen_paths: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail_with: None,
            }
        }

        fn failing(fail_with: fn() -> ExtractionError) -> Self {
            Self {
                fail_with: Some(fail_with),
                ..Self::with_text("")
            }
        }
    }

    #[async_trait]
    impl DocumentExtractor for FakeExtractor {
        async fn extract(
            &self,
            path: &Path,
            _constraints: &ExtractionConstraints,
        ) -> Result<ExtractedDocument, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(path.exists(), "extractor received a missing path");
            self.seen_paths.lock().unwrap().push(path.to_path_buf());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(fail_with) = self.fail_with {
                return Err(fail_with());
            }
            Ok(ExtractedDocument {
                text: self.text.clone(),
                page_count: 3,
                file_name: "report.pdf".into(),
                file_size: 42,
                unreadable_pages: self.unreadable_pages.clone(),
                fingerprint: "abc".into(),
                ..ExtractedDocument::default()
            })
        }
    }

    /// Answers chunk prompts by section marker; earlier sections answer later.
    struct FakeGateway {
        prompts: Mutex<Vec<String>>,
        hang_on: Option<&'static str>,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                hang_on: None,
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for FakeGateway {
        async fn complete(
            &self,
            prompt: &str,
            options: &CompletionOptions,
            _timeout: Duration,
        ) -> Result<ModelCallResult, GatewayError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let is_combine = prompt.contains("partial summaries");
            let (text, delay_ms) = if is_combine {
                ("combined summary".to_string(), 0)
            } else if prompt.contains("ALPHA") {
                ("summary of alpha".to_string(), 60)
            } else if prompt.contains("BRAVO") {
                ("summary of bravo".to_string(), 30)
            } else if prompt.contains("CHARLIE") {
                ("summary of charlie".to_string(), 0)
            } else {
                ("generic answer".to_string(), 0)
            };
            if let Some(marker) = self.hang_on {
                if !is_combine && prompt.contains(marker) {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(ModelCallResult {
                text,
                token_usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 2,
                },
                model_id: options.model_id.clone(),
            })
        }
    }

    fn settings(temp_root: &Path) -> OrchestratorSettings {
        OrchestratorSettings {
            model_id: "test-model".into(),
            max_chunk_chars: 30,
            temp_directory: temp_root.to_path_buf(),
            gateway_timeout: Duration::from_millis(500),
            gateway_max_concurrency: 3,
            ..OrchestratorSettings::default()
        }
    }

    fn upload_request(request_id: &str, task: &str, parameters: serde_json::Value) -> TaskRequest {
        TaskRequest {
            request_id: request_id.into(),
            task: task.into(),
            document: DocumentRef::Upload {
                file_name: "report.pdf".into(),
                bytes: b"%PDF-1.4 fake".to_vec(),
            },
            parameters,
            source: Some("unit-test".into()),
        }
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn three_chunk_summary_combines_once_in_chunk_order() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let extractor = Arc::new(FakeExtractor::with_text(THREE_SECTIONS));
        let gateway = Arc::new(FakeGateway::new());
        let orchestrator =
            Orchestrator::new(extractor.clone(), gateway.clone(), settings(temp_root.path()));

        let result = orchestrator
            .handle(upload_request("req-sum", "summarize", json!({"max_length": 200})))
            .await;

        assert!(result.success, "unexpected failure: {:?}", result.error);
        let Some(TaskOutput::Summarize {
            summary,
            chunk_count,
            token_usage,
            ..
        }) = result.result
        else {
            panic!("expected a summary payload");
        };
        assert_eq!(summary, "combined summary");
        assert_eq!(chunk_count, 3);
        assert_eq!(token_usage.prompt_tokens, 40);

        let prompts = gateway.prompts();
        let combines: Vec<&String> = prompts
            .iter()
            .filter(|prompt| prompt.contains("partial summaries"))
            .collect();
        assert_eq!(combines.len(), 1);
        let combine = combines[0];
        let alpha = combine.find("summary of alpha").expect("alpha partial");
        let bravo = combine.find("summary of bravo").expect("bravo partial");
        let charlie = combine.find("summary of charlie").expect("charlie partial");
        assert!(alpha < bravo && bravo < charlie);
        assert_eq!(prompts.last(), Some(combine));

        assert!(is_empty_dir(temp_root.path()));
        assert!(orchestrator.task_status("req-sum").is_none());
        assert_eq!(orchestrator.service_status().metrics.requests_succeeded, 1);
    }

    #[tokio::test]
    async fn empty_question_fails_validation_without_side_effects() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let extractor = Arc::new(FakeExtractor::with_text(THREE_SECTIONS));
        let gateway = Arc::new(FakeGateway::new());
        let orchestrator =
            Orchestrator::new(extractor.clone(), gateway.clone(), settings(temp_root.path()));

        let result = orchestrator
            .handle(upload_request("req-qa", "question_answer", json!({"question": ""})))
            .await;

        assert!(!result.success);
        let error = result.error.expect("error body");
        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.field.as_deref(), Some("parameters.question"));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert!(gateway.prompts().is_empty());
        assert!(is_empty_dir(temp_root.path()));
    }

    #[tokio::test]
    async fn duplicate_in_flight_id_is_rejected_without_second_extraction() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let mut extractor = FakeExtractor::with_text(THREE_SECTIONS);
        extractor.delay = Duration::from_millis(200);
        let extractor = Arc::new(extractor);
        let gateway = Arc::new(FakeGateway::new());
        let orchestrator = Arc::new(Orchestrator::new(
            extractor.clone(),
            gateway,
            settings(temp_root.path()),
        ));

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .handle(upload_request("req-dup", "analyze", serde_json::Value::Null))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = orchestrator.task_status("req-dup").expect("in flight");
        assert_eq!(status.task, "analyze");

        let second = orchestrator
            .handle(upload_request("req-dup", "analyze", serde_json::Value::Null))
            .await;
        assert_eq!(second.error_kind(), Some(ErrorKind::DuplicateRequestError));

        let first = first.await.expect("join");
        assert!(first.success, "first run failed: {:?}", first.error);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_text_is_a_fatal_extraction_error() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let gateway = Arc::new(FakeGateway::new());
        let orchestrator = Orchestrator::new(
            Arc::new(FakeExtractor::with_text("  \n\n \t ")),
            gateway.clone(),
            settings(temp_root.path()),
        );

        let result = orchestrator
            .handle(upload_request("req-empty", "summarize", serde_json::Value::Null))
            .await;

        let error = result.error.expect("error body");
        assert_eq!(error.kind, ErrorKind::ExtractionError);
        assert_eq!(error.fatal, Some(true));
        assert!(gateway.prompts().is_empty());
        assert_eq!(
            result.document_info.map(|info| info.file_name),
            Some("report.pdf".to_string())
        );
    }

    #[tokio::test]
    async fn chunk_timeout_fails_request_and_cleans_temp_area() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let extractor = Arc::new(FakeExtractor::with_text(THREE_SECTIONS));
        let mut gateway = FakeGateway::new();
        gateway.hang_on = Some("BRAVO");
        let gateway = Arc::new(gateway);
        let orchestrator =
            Orchestrator::new(extractor.clone(), gateway.clone(), settings(temp_root.path()));

        let result = orchestrator
            .handle(upload_request("req-timeout", "summarize", serde_json::Value::Null))
            .await;

        assert!(!result.success);
        assert!(result.result.is_none());
        let error = result.error.expect("error body");
        assert_eq!(error.kind, ErrorKind::GatewayError);
        assert_eq!(error.timeout, Some(true));
        assert!(
            !gateway
                .prompts()
                .iter()
                .any(|prompt| prompt.contains("partial summaries"))
        );

        let staged = extractor.seen_paths.lock().unwrap().clone();
        assert_eq!(staged.len(), 1);
        assert!(!staged[0].exists());
        assert!(is_empty_dir(temp_root.path()));
    }

    #[tokio::test]
    async fn degraded_extraction_still_succeeds() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let mut extractor = FakeExtractor::with_text("Short readable text.");
        extractor.unreadable_pages = vec![2];
        let orchestrator = Orchestrator::new(
            Arc::new(extractor),
            Arc::new(FakeGateway::new()),
            settings(temp_root.path()),
        );

        let result = orchestrator
            .handle(upload_request("req-degraded", "analyze", json!({"focus": "risks"})))
            .await;

        assert!(result.success);
        let info = result.document_info.expect("document info");
        assert!(info.degraded);
        assert_eq!(info.unreadable_pages, vec![2]);
    }

    #[tokio::test]
    async fn question_answer_uses_budgeted_context() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let gateway = Arc::new(FakeGateway::new());
        let mut settings = settings(temp_root.path());
        settings.qa_token_budget = 1;
        let orchestrator = Orchestrator::new(
            Arc::new(FakeExtractor::with_text(THREE_SECTIONS)),
            gateway.clone(),
            settings,
        );

        let result = orchestrator
            .handle(upload_request(
                "req-qa-ok",
                "question_answer",
                json!({"question": "What is in alpha?"}),
            ))
            .await;

        let Some(TaskOutput::QuestionAnswer {
            chunks_used,
            chunks_total,
            question,
            ..
        }) = result.result
        else {
            panic!("expected an answer payload: {:?}", result.error);
        };
        assert_eq!(chunks_used, 1);
        assert_eq!(chunks_total, 3);
        assert_eq!(question, "What is in alpha?");

        let prompts = gateway.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("ALPHA"));
        assert!(!prompts[0].contains("BRAVO"));
    }

    #[tokio::test]
    async fn unknown_task_and_empty_id_are_validation_errors() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let orchestrator = Orchestrator::new(
            Arc::new(FakeExtractor::with_text(THREE_SECTIONS)),
            Arc::new(FakeGateway::new()),
            settings(temp_root.path()),
        );

        let unknown = orchestrator
            .handle(upload_request("req-x", "translate", serde_json::Value::Null))
            .await;
        assert_eq!(
            unknown.error.and_then(|error| error.field),
            Some("task".to_string())
        );

        let empty = orchestrator
            .handle(upload_request("  ", "summarize", serde_json::Value::Null))
            .await;
        assert_eq!(
            empty.error.and_then(|error| error.field),
            Some("request_id".to_string())
        );
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_staging() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let extractor = Arc::new(FakeExtractor::with_text(THREE_SECTIONS));
        let mut settings = settings(temp_root.path());
        settings.max_file_size = 4;
        let orchestrator = Orchestrator::new(extractor.clone(), Arc::new(FakeGateway::new()), settings);

        let result = orchestrator
            .handle(upload_request("req-big", "summarize", serde_json::Value::Null))
            .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::ValidationError));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert!(is_empty_dir(temp_root.path()));
    }

    #[tokio::test]
    async fn inline_text_bypasses_extractor() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let extractor = Arc::new(FakeExtractor::with_text("unused"));
        let orchestrator = Orchestrator::new(
            extractor.clone(),
            Arc::new(FakeGateway::new()),
            settings(temp_root.path()),
        );

        let result = orchestrator
            .handle(TaskRequest {
                request_id: "req-inline".into(),
                task: "extract".into(),
                document: DocumentRef::Inline {
                    text: "CHARLIE notes".into(),
                    label: Some("notes".into()),
                },
                parameters: json!({"extraction_type": "action_items"}),
                source: None,
            })
            .await;

        assert!(result.success, "unexpected failure: {:?}", result.error);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        let info = result.document_info.expect("document info");
        assert_eq!(info.file_name, "notes");
        assert_eq!(info.page_count, 0);
    }

    #[tokio::test]
    async fn generate_rejects_blank_prompts() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let orchestrator = Orchestrator::new(
            Arc::new(FakeExtractor::with_text("unused")),
            Arc::new(FakeGateway::new()),
            settings(temp_root.path()),
        );

        assert!(matches!(
            orchestrator.generate("  ", GenerateOptions::default()).await,
            Err(TaskError::Validation { .. })
        ));
        let result = orchestrator
            .generate("Say hi", GenerateOptions::default())
            .await
            .expect("generate");
        assert_eq!(result.text, "generic answer");
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn handle_future_is_send() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let orchestrator = Orchestrator::new(
            Arc::new(FakeExtractor::with_text(THREE_SECTIONS)),
            Arc::new(FakeGateway::new()),
            settings(temp_root.path()),
        );
        let pending = orchestrator.handle(upload_request("req-send", "summarize", json!({})));
        assert_send(&pending);
        assert!(pending.await.success);
    }

    #[test]
    fn extraction_errors_map_to_validation_or_fatal_extraction() {
        for error in [
            ExtractionError::NotFound("/missing.pdf".into()),
            ExtractionError::FileTooLarge { size: 10, limit: 5 },
            ExtractionError::PageLimitExceeded { pages: 9, limit: 2 },
        ] {
            let mapped = map_extraction_error(error);
            assert_eq!(mapped.kind(), ErrorKind::ValidationError);
            assert_eq!(mapped.to_body().field.as_deref(), Some("document"));
        }
        for error in [
            ExtractionError::UnsupportedFormat("notes.txt".into()),
            ExtractionError::Corrupt("bad xref".into()),
            ExtractionError::Io(std::io::Error::other("disk gone")),
        ] {
            let mapped = map_extraction_error(error);
            assert_eq!(mapped.kind(), ErrorKind::ExtractionError);
            assert_eq!(mapped.to_body().fatal, Some(true));
        }
    }

    #[tokio::test]
    async fn corrupt_and_unsupported_documents_fail_extraction() {
        let failures: [fn() -> ExtractionError; 2] = [
            || ExtractionError::Corrupt("invalid cross-reference table".into()),
            || ExtractionError::UnsupportedFormat("scan.tiff".into()),
        ];
        for (position, fail_with) in failures.into_iter().enumerate() {
            let temp_root = tempfile::tempdir().expect("temp root");
            let gateway = Arc::new(FakeGateway::new());
            let orchestrator = Orchestrator::new(
                Arc::new(FakeExtractor::failing(fail_with)),
                gateway.clone(),
                settings(temp_root.path()),
            );

            let result = orchestrator
                .handle(upload_request(&format!("req-bad-{position}"), "analyze", json!({})))
                .await;

            assert!(!result.success);
            let error = result.error.expect("error body");
            assert_eq!(error.kind, ErrorKind::ExtractionError);
            assert_eq!(error.fatal, Some(true));
            assert!(gateway.prompts().is_empty());
            assert!(is_empty_dir(temp_root.path()));
        }
    }

    #[tokio::test]
    async fn page_limit_is_a_document_validation_error() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let orchestrator = Orchestrator::new(
            Arc::new(FakeExtractor::failing(|| ExtractionError::PageLimitExceeded {
                pages: 700,
                limit: 500,
            })),
            Arc::new(FakeGateway::new()),
            settings(temp_root.path()),
        );

        let result = orchestrator
            .handle(upload_request("req-pages", "summarize", json!({})))
            .await;

        let error = result.error.expect("error body");
        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.field.as_deref(), Some("document"));
        assert!(is_empty_dir(temp_root.path()));
    }

    #[tokio::test]
    async fn distinct_request_ids_run_concurrently() {
        let temp_root = tempfile::tempdir().expect("temp root");
        let mut extractor = FakeExtractor::with_text(THREE_SECTIONS);
        extractor.delay = Duration::from_millis(100);
        let extractor = Arc::new(extractor);
        let gateway = Arc::new(FakeGateway::new());
        let orchestrator =
            Orchestrator::new(extractor.clone(), gateway.clone(), settings(temp_root.path()));

        let (first, second) = tokio::join!(
            orchestrator.handle(upload_request("req-a", "summarize", json!({}))),
            orchestrator.handle(upload_request("req-b", "summarize", json!({}))),
        );

        assert!(first.success, "first failed: {:?}", first.error);
        assert!(second.success, "second failed: {:?}", second.error);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
        // Three chunk prompts and one combine per request.
        assert_eq!(gateway.prompts().len(), 8);
        assert_eq!(orchestrator.service_status().metrics.requests_succeeded, 2);
        assert!(orchestrator.task_status("req-a").is_none());
        assert!(orchestrator.task_status("req-b").is_none());
        assert!(is_empty_dir(temp_root.path()));
    }
}
