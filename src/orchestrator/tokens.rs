//! Token counting for prompt budgets.
//!
//! Prefers a `tiktoken-rs` encoding (by encoding name or model name) and falls back to a
//! whitespace counter when the tokenizer cannot be loaded. The fallback is logged at `warn`
//! level; budgets stay approximate instead of blocking requests.

use anyhow::Error as TokenizerError;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

/// Shared token counting function.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Build a counter for `encoding`, which may be an encoding name or a model name.
pub fn build_token_counter(encoding: &str) -> TokenCounter {
    let target = match encoding.trim() {
        "" => "cl100k_base",
        value => value,
    };
    match resolve_encoding(target) {
        Ok(bpe) => {
            let bpe = Arc::new(bpe);
            Arc::new(move |segment: &str| bpe.encode_ordinary(segment).len())
        }
        Err(error) => {
            tracing::warn!(
                encoding = target,
                error = %error,
                "Tokenizer unavailable; falling back to whitespace counter"
            );
            whitespace_token_counter()
        }
    }
}

fn resolve_encoding(name: &str) -> Result<CoreBPE, TokenizerError> {
    if let Some(encoding) = encoding_from_name(name) {
        return encoding;
    }
    get_bpe_from_model(name)
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

/// Counts whitespace-separated words; non-empty text always counts as at least one token.
pub fn whitespace_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_counter_counts_words() {
        let counter = whitespace_token_counter();
        assert_eq!(counter("one two  three"), 3);
        assert_eq!(counter("   "), 1);
        assert_eq!(counter(""), 0);
    }

    #[test]
    fn cl100k_counter_counts_tokens() {
        let counter = build_token_counter("cl100k_base");
        let tokens = counter("The quick brown fox jumps over the lazy dog.");
        assert!(tokens > 5 && tokens < 20, "unexpected token count {tokens}");
    }

    #[test]
    fn unknown_encodings_fall_back_to_whitespace() {
        let counter = build_token_counter("ibm-granite/granite-13b-chat-v2");
        assert_eq!(counter("alpha beta gamma"), 3);
    }
}
