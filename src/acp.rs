//! ACP HTTP surface.
//!
//! A compact Axum router in front of the orchestrator:
//!
//! - `POST /acp/process` – Run a task over a document already on the server's filesystem.
//! - `POST /acp/upload` – Run a task over a PDF sent as the `file` part of a multipart form.
//!   Task options travel in the query string or as text parts (`task`, default `summarize`;
//!   `parameters` as JSON; `request_id`; `source`, default `file_upload`).
//! - `GET /acp/status` – Task counters, in-flight count, and the configured model.
//! - `GET /acp/tasks/{request_id}` – Lifecycle state of an in-flight request.
//! - `GET /acp/health` – Liveness probe.
//!
//! Task endpoints always answer with the serialized `TaskResult`; the HTTP status reflects
//! `error.kind` (400 validation, 422 extraction, 409 duplicate, 502 gateway, 500 internal).

use crate::orchestrator::{
    DocumentRef, ErrorKind, ServiceStatus, TaskError, TaskRequest, TaskResult, TaskService,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Slack on top of the document limit for the upload body, so the orchestrator's own size
/// check produces the error instead of a bare 413.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

/// Build the ACP router. `max_upload_bytes` bounds the upload body.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: TaskService + 'static,
{
    Router::new()
        .route("/acp/process", post(process_document::<S>))
        .route(
            "/acp/upload",
            post(upload_document::<S>)
                .layer(DefaultBodyLimit::max(max_upload_bytes.saturating_add(UPLOAD_BODY_SLACK))),
        )
        .route("/acp/status", get(get_status::<S>))
        .route("/acp/tasks/:request_id", get(get_task::<S>))
        .route("/acp/health", get(health))
        .with_state(service)
}

/// Request body for `POST /acp/process`.
#[derive(Deserialize)]
struct ProcessRequest {
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    task: String,
    #[serde(default)]
    document_path: Option<String>,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    source: Option<String>,
}

/// Source recorded for uploads that do not name one.
const UPLOAD_SOURCE: &str = "file_upload";

/// Task run when an upload does not name one.
const DEFAULT_UPLOAD_TASK: &str = "summarize";

/// Options for `POST /acp/upload`, from the query string or the form's text parts.
#[derive(Deserialize, Default)]
struct UploadOptions {
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    parameters: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

/// `TaskResult` paired with the HTTP status derived from its error kind.
struct AcpResponse(TaskResult);

impl IntoResponse for AcpResponse {
    fn into_response(self) -> Response {
        let status = match self.0.error_kind() {
            None => StatusCode::OK,
            Some(ErrorKind::ValidationError) => StatusCode::BAD_REQUEST,
            Some(ErrorKind::ExtractionError) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(ErrorKind::DuplicateRequestError) => StatusCode::CONFLICT,
            Some(ErrorKind::GatewayError) => StatusCode::BAD_GATEWAY,
            Some(ErrorKind::InternalError) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.0)).into_response()
    }
}

fn rejected(request_id: String, error: TaskError, source: Option<String>) -> AcpResponse {
    AcpResponse(TaskResult::failed(
        request_id,
        &error,
        None,
        Duration::ZERO,
        source,
    ))
}

/// Run a task over a server-side document.
async fn process_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ProcessRequest>,
) -> AcpResponse
where
    S: TaskService,
{
    let ProcessRequest {
        request_id,
        task,
        document_path,
        parameters,
        source,
    } = request;
    let Some(document_path) = document_path.filter(|path| !path.trim().is_empty()) else {
        return rejected(
            request_id,
            TaskError::validation("document_path", "document_path is required"),
            source,
        );
    };

    tracing::info!(request_id = %request_id, task = %task, path = %document_path, "ACP process request");
    let result = service
        .handle(TaskRequest {
            request_id,
            task,
            document: DocumentRef::Path(PathBuf::from(document_path)),
            parameters,
            source,
        })
        .await;
    AcpResponse(result)
}

/// The `file` part of an upload form.
struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
}

/// Drain the form: the `file` part plus any text parts, which override the query string.
async fn read_upload_form(
    multipart: &mut Multipart,
    options: &mut UploadOptions,
) -> Result<Option<UploadedFile>, MultipartError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "task" => options.task = Some(field.text().await?),
            "parameters" => options.parameters = Some(field.text().await?),
            "request_id" => options.request_id = Some(field.text().await?),
            "source" => options.source = Some(field.text().await?),
            other => tracing::debug!(field = %other, "Ignoring unknown upload form field"),
        }
    }
    Ok(file)
}

/// Run a task over an uploaded PDF.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    Query(mut options): Query<UploadOptions>,
    mut multipart: Multipart,
) -> AcpResponse
where
    S: TaskService,
{
    let form = read_upload_form(&mut multipart, &mut options).await;
    let UploadOptions {
        task,
        parameters,
        request_id,
        source,
    } = options;
    let request_id = request_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let source = Some(
        source
            .filter(|source| !source.trim().is_empty())
            .unwrap_or_else(|| UPLOAD_SOURCE.to_string()),
    );
    let task = task
        .filter(|task| !task.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_TASK.to_string());

    let file = match form {
        Ok(Some(file)) => file,
        Ok(None) => {
            return rejected(
                request_id,
                TaskError::validation("file", "a multipart 'file' part is required"),
                source,
            );
        }
        Err(error) => {
            return rejected(
                request_id,
                TaskError::validation("file", format!("malformed multipart upload: {error}")),
                source,
            );
        }
    };
    if !file.file_name.to_ascii_lowercase().ends_with(".pdf") {
        return rejected(
            request_id,
            TaskError::validation("file", "only PDF uploads are supported"),
            source,
        );
    }
    let parameters = match parameters.as_deref().map(serde_json::from_str::<Value>) {
        None => Value::Null,
        Some(Ok(value)) => value,
        Some(Err(error)) => {
            return rejected(
                request_id,
                TaskError::validation("parameters", format!("parameters must be JSON: {error}")),
                source,
            );
        }
    };

    tracing::info!(
        request_id = %request_id,
        task = %task,
        file = %file.file_name,
        bytes = file.bytes.len(),
        "ACP upload request"
    );
    let result = service
        .handle(TaskRequest {
            request_id,
            task,
            document: DocumentRef::Upload {
                file_name: file.file_name,
                bytes: file.bytes,
            },
            parameters,
            source,
        })
        .await;
    AcpResponse(result)
}

/// Response body for `GET /acp/status`.
#[derive(Serialize)]
struct StatusResponse {
    service: &'static str,
    status: &'static str,
    #[serde(flatten)]
    details: ServiceStatus,
}

async fn get_status<S>(State(service): State<Arc<S>>) -> Json<StatusResponse>
where
    S: TaskService,
{
    Json(StatusResponse {
        service: "acp-agent",
        status: "running",
        details: service.service_status(),
    })
}

async fn get_task<S>(
    State(service): State<Arc<S>>,
    Path(request_id): Path<String>,
) -> Response
where
    S: TaskService,
{
    match service.task_status(&request_id) {
        Some(status) => Json(status).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "request_id": request_id,
                "error": "no in-flight request with this id"
            })),
        )
            .into_response(),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "acp-agent" }))
}
