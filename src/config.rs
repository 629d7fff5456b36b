use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::orchestrator::OrchestratorSettings;

const DEFAULT_WATSONX_ENDPOINT: &str = "https://us-south.ml.cloud.ibm.com";
const DEFAULT_WATSONX_MODEL: &str = "ibm-granite/granite-13b-chat-v2";
const DEFAULT_WATSONX_API_VERSION: &str = "2024-01-01";
const MAX_GATEWAY_RETRIES: u32 = 2;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docrelay services.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bearer credential for the watsonx.ai text-generation API.
    pub watsonx_api_key: String,
    /// watsonx.ai project that owns the generation requests.
    pub watsonx_project_id: String,
    /// Base URL of the watsonx.ai deployment.
    pub watsonx_endpoint: String,
    /// Model identifier used for every completion.
    pub watsonx_model: String,
    /// `version` query parameter sent with generation requests.
    pub watsonx_api_version: String,
    /// Per-call timeout for model completions, in seconds.
    pub gateway_timeout_secs: u64,
    /// Retry budget for transient gateway failures (clamped to 2).
    pub gateway_max_retries: u32,
    /// Maximum concurrent chunk-level completions per request.
    pub gateway_max_concurrency: usize,
    /// Largest accepted document, in bytes.
    pub max_file_size: u64,
    /// Largest accepted document, in pages.
    pub max_pages: usize,
    /// Maximum number of characters per text chunk.
    pub chunk_size: usize,
    /// Root directory for per-request temporary files.
    pub temp_directory: PathBuf,
    /// Summary length applied when callers omit `max_length`.
    pub summary_default_max_length: usize,
    /// Token budget for question-answering context.
    pub qa_token_budget: usize,
    /// tiktoken encoding used to measure the question-answering budget.
    pub token_encoding: String,
    /// Optional override for the ACP HTTP port.
    pub acp_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            watsonx_api_key: load_env("WATSONX_API_KEY")?,
            watsonx_project_id: load_env("WATSONX_PROJECT_ID")?,
            watsonx_endpoint: load_env_optional("WATSONX_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_WATSONX_ENDPOINT.to_string()),
            watsonx_model: load_env_optional("WATSONX_MODEL")
                .unwrap_or_else(|| DEFAULT_WATSONX_MODEL.to_string()),
            watsonx_api_version: load_env_optional("WATSONX_API_VERSION")
                .unwrap_or_else(|| DEFAULT_WATSONX_API_VERSION.to_string()),
            gateway_timeout_secs: load_env_nonzero("GATEWAY_TIMEOUT_SECS", 30u64)?,
            gateway_max_retries: load_env_parsed("GATEWAY_MAX_RETRIES", 0u32)?
                .min(MAX_GATEWAY_RETRIES),
            gateway_max_concurrency: load_env_nonzero("GATEWAY_MAX_CONCURRENCY", 4usize)?,
            max_file_size: load_env_parsed("MAX_FILE_SIZE", 10_485_760u64)?,
            max_pages: load_env_parsed("MAX_PAGES", 100usize)?,
            chunk_size: load_env_nonzero("CHUNK_SIZE", 1000usize)?,
            temp_directory: load_env_optional("TEMP_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./temp")),
            summary_default_max_length: load_env_nonzero("SUMMARY_DEFAULT_MAX_LENGTH", 500usize)?,
            qa_token_budget: load_env_parsed("QA_TOKEN_BUDGET", 3000usize)?,
            token_encoding: load_env_optional("TOKEN_ENCODING")
                .unwrap_or_else(|| "cl100k_base".to_string()),
            acp_port: load_env_optional("ACP_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("ACP_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Derive the settings consumed by the orchestrator core.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            model_id: self.watsonx_model.clone(),
            max_chunk_chars: self.chunk_size,
            max_file_size: self.max_file_size,
            max_pages: self.max_pages,
            temp_directory: self.temp_directory.clone(),
            summary_default_max_length: self.summary_default_max_length,
            qa_token_budget: self.qa_token_budget,
            token_encoding: self.token_encoding.clone(),
            gateway_timeout: Duration::from_secs(self.gateway_timeout_secs),
            gateway_max_retries: self.gateway_max_retries,
            gateway_max_concurrency: self.gateway_max_concurrency,
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_parsed<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Like [`load_env_parsed`], but zero is rejected.
fn load_env_nonzero<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
{
    let value = load_env_parsed(key, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        endpoint = %config.watsonx_endpoint,
        model = %config.watsonx_model,
        chunk_size = config.chunk_size,
        max_pages = config.max_pages,
        acp_port = ?config.acp_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
