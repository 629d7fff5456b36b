//! Model gateway abstraction: a prompt goes in, generated text comes out.
//!
//! [`ModelGateway`] is the seam the orchestrator dispatches through. [`CallPolicy`] wraps a
//! single call with the configured timeout and transient-retry budget, and [`WatsonxGateway`]
//! talks to the watsonx.ai text-generation API.

mod policy;
mod watsonx;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub use policy::CallPolicy;
pub use watsonx::WatsonxGateway;

/// Generation options attached to a single completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature; `0.0` requests greedy decoding.
    pub temperature: f32,
    /// Model identifier understood by the backend.
    pub model_id: String,
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced by the model.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Add another call's usage to this running total.
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Successful completion returned by a gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCallResult {
    /// Generated text, trimmed.
    pub text: String,
    /// Token usage for this call.
    pub token_usage: TokenUsage,
    /// Model that served the call.
    pub model_id: String,
}

/// Errors surfaced by model gateways.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The call did not finish within its timeout.
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
    /// The backend could not be reached.
    #[error("Model endpoint unreachable: {0}")]
    Transport(String),
    /// The backend rejected the configured credentials.
    #[error("Model endpoint rejected credentials (HTTP {status})")]
    Auth {
        /// HTTP status returned by the backend.
        status: u16,
    },
    /// The backend answered with an unexpected status.
    #[error("Model endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status returned by the backend.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The backend answered with a body we could not interpret.
    #[error("Malformed model response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Whether this failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Auth { .. } | Self::InvalidResponse(_) => false,
        }
    }
}

/// Interface implemented by language-model backends.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        timeout: Duration,
    ) -> Result<ModelCallResult, GatewayError>;
}
