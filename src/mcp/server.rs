//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        format::{capabilities_snapshot, json_resource_contents, serialize_json},
        handlers::{
            generate::handle_generate, metrics::handle_metrics,
            process::handle_process_document, text::handle_text_task,
        },
        registry, schemas,
    },
    orchestrator::{Orchestrator, TaskKind},
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, JsonObject, ListResourcesResult,
        ListToolsResult, RawResource, ReadResourceRequestParam, ReadResourceResult, Resource,
        ServerCapabilities, ServerInfo, Tool, ToolAnnotations,
    },
};

const CAPABILITIES_URI: &str = "mcp://capabilities";
const SETTINGS_URI: &str = "mcp://settings";

/// MCP server exposing the document-task pipeline and direct model access.
#[derive(Clone)]
pub struct DocRelayMcpServer {
    orchestrator: Arc<Orchestrator>,
    registry: Arc<registry::Registry>,
}

impl DocRelayMcpServer {
    /// Create a new MCP server around a shared orchestrator.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let mut registry = registry::Registry::new();
        registry.register_resource(CAPABILITIES_URI, resource_capabilities);
        registry.register_resource(SETTINGS_URI, resource_settings);

        registry.register_tool("process-document", tool_process_document);
        registry.register_tool("summarize-text", tool_summarize_text);
        registry.register_tool("answer-question", tool_answer_question);
        registry.register_tool("extract-key-points", tool_extract_key_points);
        registry.register_tool("analyze-text", tool_analyze_text);
        registry.register_tool("generate", tool_generate);
        registry.register_tool("metrics", tool_metrics);
        tracing::debug!(tools = ?registry.tool_names(), "Registered MCP tools");

        Self {
            orchestrator,
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        vec![
            describe_tool(
                "process-document",
                "Process Document",
                "Run summarize, question_answer, extract, or analyze over a PDF the server can read.",
                schemas::process_document_input_schema(),
                ToolAnnotations::with_title("Process Document")
                    .read_only(true)
                    .idempotent(false)
                    .open_world(true),
            ),
            describe_tool(
                "summarize-text",
                "Summarize Text",
                "Summarize supplied text to roughly max_length characters.",
                schemas::summarize_text_input_schema(),
                model_task_annotations("Summarize Text"),
            ),
            describe_tool(
                "answer-question",
                "Answer Question",
                "Answer a question using the supplied text as context.",
                schemas::answer_question_input_schema(),
                model_task_annotations("Answer Question"),
            ),
            describe_tool(
                "extract-key-points",
                "Extract Key Points",
                "List key points, entities, or action items found in the supplied text.",
                schemas::extract_input_schema(),
                model_task_annotations("Extract Key Points"),
            ),
            describe_tool(
                "analyze-text",
                "Analyze Text",
                "Analyze topics, findings, structure, and insights of the supplied text.",
                schemas::analyze_input_schema(),
                model_task_annotations("Analyze Text"),
            ),
            describe_tool(
                "generate",
                "Generate",
                "Send a prompt straight to the configured model.",
                schemas::generate_input_schema(),
                model_task_annotations("Generate"),
            ),
            describe_tool(
                "metrics",
                "Metrics Snapshot",
                "Check request, model-call, and chunk counters at a glance.",
                schemas::empty_object_schema(),
                ToolAnnotations::with_title("Metrics Snapshot")
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
        ]
    }

    fn describe_resources(&self) -> Vec<Resource> {
        let mut capabilities = RawResource::new(CAPABILITIES_URI, "capabilities");
        capabilities.description =
            Some("Supported tasks, their required parameters, and the configured model".into());

        let mut settings = RawResource::new(SETTINGS_URI, "settings");
        settings.description =
            Some("Effective limits: chunk size, file size, page count, timeouts, budgets".into());

        vec![capabilities.no_annotation(), settings.no_annotation()]
    }
}

fn describe_tool(
    name: &'static str,
    title: &str,
    description: &'static str,
    input_schema: JsonObject,
    annotations: ToolAnnotations,
) -> Tool {
    Tool {
        name: Cow::Borrowed(name),
        title: Some(title.to_string()),
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(input_schema),
        output_schema: None,
        annotations: Some(annotations),
        icons: None,
    }
}

fn model_task_annotations(title: &str) -> ToolAnnotations {
    ToolAnnotations::with_title(title)
        .read_only(true)
        .idempotent(false)
        .open_world(true)
}

fn resource_capabilities(
    server: &DocRelayMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let orchestrator = server.orchestrator.clone();
    Box::pin(async move {
        let payload = capabilities_snapshot(&orchestrator.settings().model_id);
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                CAPABILITIES_URI,
                serialize_json(&payload, CAPABILITIES_URI),
            )],
        })
    })
}

fn resource_settings(
    server: &DocRelayMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let orchestrator = server.orchestrator.clone();
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                SETTINGS_URI,
                serialize_json(orchestrator.settings(), SETTINGS_URI),
            )],
        })
    })
}

fn tool_process_document(
    server: &DocRelayMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let orchestrator = server.orchestrator.clone();
    Box::pin(async move { handle_process_document(&orchestrator, request.arguments).await })
}

fn tool_summarize_text(
    server: &DocRelayMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    text_tool(server, TaskKind::Summarize, request)
}

fn tool_answer_question(
    server: &DocRelayMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    text_tool(server, TaskKind::QuestionAnswer, request)
}

fn tool_extract_key_points(
    server: &DocRelayMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    text_tool(server, TaskKind::Extract, request)
}

fn tool_analyze_text(
    server: &DocRelayMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    text_tool(server, TaskKind::Analyze, request)
}

fn text_tool(
    server: &DocRelayMcpServer,
    kind: TaskKind,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let orchestrator = server.orchestrator.clone();
    Box::pin(async move { handle_text_task(&orchestrator, kind, request.arguments).await })
}

fn tool_generate(server: &DocRelayMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let orchestrator = server.orchestrator.clone();
    Box::pin(async move { handle_generate(&orchestrator, request.arguments).await })
}

fn tool_metrics(
    server: &DocRelayMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let orchestrator = server.orchestrator.clone();
    Box::pin(async move { handle_metrics(&orchestrator).await })
}

impl ServerHandler for DocRelayMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "docrelay".to_string();
        implementation.title = Some("DocRelay MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Use this server to summarize, question, extract from, and analyze documents. Call process-document for PDFs on the server, the *-text tools for text you already hold, and generate for raw prompts. Read mcp://capabilities for task parameters.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.describe_resources();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.resources.get(request.uri.as_str()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tools.get(request.name.as_ref()) {
                tracing::debug!(tool = %request.name, "Dispatching MCP tool");
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}
