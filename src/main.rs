use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docrelay::{
    acp, config,
    logging::{self, LogTarget},
    orchestrator::{DocumentRef, Orchestrator, TaskRequest},
};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;

const PORT_RANGE: std::ops::RangeInclusive<u16> = 8080..=8099;

#[derive(Parser)]
#[command(
    name = "docrelay",
    version,
    about = "Document task orchestrator for ACP and MCP agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the ACP HTTP routes (default).
    Serve {
        /// Port to bind; overrides ACP_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single task against a local PDF and print the result as JSON.
    Process {
        /// PDF to process.
        #[arg(long)]
        file: PathBuf,
        /// Task name: summarize, question_answer, extract, or analyze.
        #[arg(long)]
        task: String,
        /// Task parameters as a JSON object.
        #[arg(long)]
        parameters: Option<String>,
        /// Request identifier; a UUID is generated when omitted.
        #[arg(long)]
        request_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve { port: None });

    // `.env` may carry RUST_LOG and DOCRELAY_LOG_FILE, so load it before the subscriber.
    dotenvy::dotenv().ok();
    logging::init_tracing(match command {
        Command::Serve { .. } => LogTarget::StdoutAndFile,
        Command::Process { .. } => LogTarget::FileOnly,
    });
    let config = config::init_config().context("failed to load configuration")?;

    match command {
        Command::Serve { port } => {
            let orchestrator =
                Orchestrator::from_config(config).context("failed to build model gateway")?;
            let max_upload_bytes = usize::try_from(config.max_file_size).unwrap_or(usize::MAX);
            let app = acp::create_router(Arc::new(orchestrator), max_upload_bytes);

            let (listener, port) = bind_listener(port.or(config.acp_port))
                .await
                .context("failed to bind ACP listener")?;
            tracing::info!("Listening on http://0.0.0.0:{}", port);
            axum::serve(listener, app)
                .await
                .context("ACP server terminated unexpectedly")?;
        }
        Command::Process {
            file,
            task,
            parameters,
            request_id,
        } => {
            let parameters = match parameters {
                Some(raw) => serde_json::from_str::<Value>(&raw)
                    .context("--parameters must be a JSON object")?,
                None => Value::Null,
            };
            let orchestrator =
                Orchestrator::from_config(config).context("failed to build model gateway")?;
            let result = orchestrator
                .handle(TaskRequest {
                    request_id: request_id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    task,
                    document: DocumentRef::Path(file),
                    parameters,
                    source: Some("cli".to_string()),
                })
                .await;

            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("failed to encode result")?
            );
            if !result.success {
                bail!("task did not complete");
            }
        }
    }

    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8080-8099",
    ))
}
