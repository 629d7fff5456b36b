//! MCP server entrypoint (stdio transport).
//!
//! Exposes docrelay's document tasks and model access over stdio for editor and agent
//! integrations. Runtime configuration is shared with the ACP binary; logs go to the file
//! layer only because stdout carries protocol frames.
use anyhow::{Context, Result};
use docrelay::{
    config,
    logging::{self, LogTarget},
    mcp::DocRelayMcpServer,
    orchestrator::Orchestrator,
};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing(LogTarget::FileOnly);
    let config = config::init_config().context("failed to load configuration")?;

    let orchestrator =
        Orchestrator::from_config(config).context("failed to build model gateway")?;
    let server = DocRelayMcpServer::new(Arc::new(orchestrator));

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
