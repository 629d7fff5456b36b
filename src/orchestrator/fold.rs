//! Prompt execution strategies: fold (map chunks, combine in order) and budgeted single pass.

use super::chunking::TextChunk;
use super::dispatch::{Completion, PromptStrategy, TaskSpec};
use super::tokens::TokenCounter;
use super::types::TaskParameters;
use crate::gateway::{CallPolicy, CompletionOptions, GatewayError, ModelCallResult, ModelGateway, TokenUsage};
use crate::metrics::TaskMetrics;
use futures_util::{
    future::{BoxFuture, FutureExt},
    stream::{self, StreamExt, TryStreamExt},
};

/// Collaborators and limits for one request's model calls.
pub(crate) struct DispatchContext<'a> {
    pub gateway: &'a dyn ModelGateway,
    pub policy: CallPolicy,
    pub options: CompletionOptions,
    pub metrics: &'a TaskMetrics,
    pub max_concurrency: usize,
    pub qa_token_budget: usize,
    pub token_counter: &'a TokenCounter,
}

impl DispatchContext<'_> {
    async fn call(&self, prompt: &str) -> Result<ModelCallResult, GatewayError> {
        self.policy
            .complete(self.gateway, prompt, &self.options, self.metrics)
            .await
    }
}

/// Run the task's prompt strategy over `chunks` and return the final completion.
///
/// Any failed call aborts the outstanding calls; partial outputs are discarded.
pub(crate) async fn execute(
    context: &DispatchContext<'_>,
    spec: &TaskSpec,
    parameters: &TaskParameters,
    chunks: &[TextChunk],
    original_length: usize,
) -> Result<Completion, GatewayError> {
    match spec.strategy {
        PromptStrategy::Fold => fold(context, spec, parameters, chunks, original_length).await,
        PromptStrategy::Budgeted => {
            budgeted(context, spec, parameters, chunks, original_length).await
        }
    }
}

async fn fold(
    context: &DispatchContext<'_>,
    spec: &TaskSpec,
    parameters: &TaskParameters,
    chunks: &[TextChunk],
    original_length: usize,
) -> Result<Completion, GatewayError> {
    if let [only] = chunks {
        let result = context
            .call(&spec.chunk_prompt(parameters, &only.content))
            .await?;
        return Ok(Completion {
            text: result.text,
            original_length,
            chunk_count: 1,
            chunks_used: 1,
            model_id: result.model_id,
            token_usage: result.token_usage,
        });
    }

    let prompts: Vec<String> = chunks
        .iter()
        .map(|chunk| spec.chunk_prompt(parameters, &chunk.content))
        .collect();
    let calls: Vec<BoxFuture<'_, Result<ModelCallResult, GatewayError>>> = prompts
        .into_iter()
        .map(|prompt| async move { context.call(&prompt).await }.boxed())
        .collect();

    // `buffered` yields in input order regardless of which call finishes first.
    let partials: Vec<ModelCallResult> = stream::iter(calls)
        .buffered(context.max_concurrency.max(1))
        .try_collect()
        .await?;

    let mut token_usage = TokenUsage::default();
    for partial in &partials {
        token_usage.accumulate(partial.token_usage);
    }
    let joined = partials
        .iter()
        .enumerate()
        .map(|(position, partial)| format!("Section {}:\n{}", position + 1, partial.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    tracing::debug!(
        partials = partials.len(),
        combined_chars = joined.len(),
        "Combining partial outputs"
    );
    let combined = context
        .call(&spec.combine_prompt(parameters, &joined))
        .await?;
    token_usage.accumulate(combined.token_usage);

    Ok(Completion {
        text: combined.text,
        original_length,
        chunk_count: chunks.len(),
        chunks_used: chunks.len(),
        model_id: combined.model_id,
        token_usage,
    })
}

async fn budgeted(
    context: &DispatchContext<'_>,
    spec: &TaskSpec,
    parameters: &TaskParameters,
    chunks: &[TextChunk],
    original_length: usize,
) -> Result<Completion, GatewayError> {
    let selected = select_within_budget(chunks, context.qa_token_budget, context.token_counter);
    let context_text: String = chunks[..selected]
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect();
    tracing::debug!(
        chunks_used = selected,
        chunks_total = chunks.len(),
        token_budget = context.qa_token_budget,
        "Selected question-answering context"
    );

    let result = context
        .call(&spec.chunk_prompt(parameters, &context_text))
        .await?;
    Ok(Completion {
        text: result.text,
        original_length,
        chunk_count: chunks.len(),
        chunks_used: selected,
        model_id: result.model_id,
        token_usage: result.token_usage,
    })
}

/// Number of leading chunks whose cumulative token count fits `budget`.
///
/// The first chunk is always taken; selection stops at the first chunk that does not fit.
pub(crate) fn select_within_budget(
    chunks: &[TextChunk],
    budget: usize,
    counter: &TokenCounter,
) -> usize {
    let mut used = 0usize;
    let mut selected = 0usize;
    for chunk in chunks {
        let tokens = counter(&chunk.content);
        if selected > 0 && used + tokens > budget {
            break;
        }
        used += tokens;
        selected += 1;
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tokens::whitespace_token_counter;

    fn chunk(index: usize, content: &str) -> TextChunk {
        TextChunk {
            index,
            content: content.to_string(),
            char_range: 0..content.chars().count(),
        }
    }

    #[test]
    fn budget_takes_leading_chunks_that_fit() {
        let chunks = vec![
            chunk(0, "one two three "),
            chunk(1, "four five "),
            chunk(2, "six seven eight nine "),
            chunk(3, "ten "),
        ];
        let counter = whitespace_token_counter();
        assert_eq!(select_within_budget(&chunks, 5, &counter), 2);
        assert_eq!(select_within_budget(&chunks, 100, &counter), 4);
    }

    #[test]
    fn first_chunk_is_always_selected() {
        let chunks = vec![chunk(0, "far too many words for the budget "), chunk(1, "x ")];
        let counter = whitespace_token_counter();
        assert_eq!(select_within_budget(&chunks, 1, &counter), 1);
    }

    #[test]
    fn selection_stops_at_first_misfit() {
        let chunks = vec![chunk(0, "a "), chunk(1, "b c d e "), chunk(2, "f ")];
        let counter = whitespace_token_counter();
        assert_eq!(select_within_budget(&chunks, 3, &counter), 1);
    }
}
