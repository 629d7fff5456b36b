//! Static task table: required parameters, prompt templates, prompt strategy, completion
//! profile, and result shape for every task type.
//!
//! Adding a task type means adding a [`TaskKind`] and [`TaskParameters`] variant plus one
//! entry in [`TASK_TABLE`]; the orchestrator's control flow does not change.

use super::types::{ExtractionType, TaskError, TaskKind, TaskOutput, TaskParameters};
use crate::gateway::TokenUsage;
use serde_json::{Map, Value};

/// How prompts are assembled from the chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStrategy {
    /// One call per chunk, then one combine call over the partial outputs in chunk order.
    Fold,
    /// One call over the leading chunks that fit the token budget.
    Budgeted,
}

/// Generated-token allowance for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAllowance {
    /// Fixed number of tokens.
    Fixed(u32),
    /// A quarter of the requested summary length in characters.
    QuarterOfMaxLength,
}

/// Defaults applied while parsing parameters.
#[derive(Debug, Clone, Copy)]
pub struct ParameterDefaults {
    /// Summary length used when `max_length` is absent.
    pub summary_max_length: usize,
}

/// Everything the orchestrator needs to shape a result.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Final generated text.
    pub text: String,
    /// Characters in the document text.
    pub original_length: usize,
    /// Chunks the document was split into.
    pub chunk_count: usize,
    /// Chunks whose text reached the model.
    pub chunks_used: usize,
    /// Model that served the final call.
    pub model_id: String,
    /// Usage summed over every call.
    pub token_usage: TokenUsage,
}

/// One row of the task table.
pub struct TaskSpec {
    /// Task type this row describes.
    pub kind: TaskKind,
    /// One-line description surfaced through capabilities listings.
    pub description: &'static str,
    /// Parameters that must be present in the request.
    pub required_parameters: &'static [&'static str],
    /// Template applied to a single chunk (or the whole context for budgeted tasks).
    pub chunk_template: &'static str,
    /// Template applied to the joined partial outputs of a fold.
    pub combine_template: &'static str,
    /// Prompt assembly strategy.
    pub strategy: PromptStrategy,
    /// Generated-token allowance.
    pub max_tokens: TokenAllowance,
    /// Sampling temperature.
    pub temperature: f32,
    /// Structural parameter validation.
    pub parse: fn(&Map<String, Value>, &ParameterDefaults) -> Result<TaskParameters, TaskError>,
    /// Result shape.
    pub shape: fn(&TaskParameters, Completion) -> TaskOutput,
}

impl TaskSpec {
    /// Tokens to request for the given parameters.
    pub fn max_tokens_for(&self, parameters: &TaskParameters) -> u32 {
        match (self.max_tokens, parameters) {
            (TokenAllowance::Fixed(tokens), _) => tokens,
            (TokenAllowance::QuarterOfMaxLength, TaskParameters::Summarize { max_length }) => {
                u32::try_from(max_length / 4).unwrap_or(u32::MAX).max(16)
            }
            (TokenAllowance::QuarterOfMaxLength, _) => 16,
        }
    }

    /// Prompt for one chunk (or the budgeted context).
    pub fn chunk_prompt(&self, parameters: &TaskParameters, text: &str) -> String {
        render(self.chunk_template, parameters, text)
    }

    /// Prompt that folds the partial outputs, already joined in chunk order.
    pub fn combine_prompt(&self, parameters: &TaskParameters, partials: &str) -> String {
        render(self.combine_template, parameters, partials)
    }
}

/// The task table, one row per [`TaskKind`].
pub static TASK_TABLE: [TaskSpec; 4] = [
    TaskSpec {
        kind: TaskKind::Summarize,
        description: "Summarize a document to roughly `max_length` characters.",
        required_parameters: &[],
        chunk_template: "Please provide a concise summary of the following text in approximately \
            {max_length} characters:\n\n{text}\n\nSummary:",
        combine_template: "The following are partial summaries of consecutive sections of one \
            document, in order. Combine them into a single concise summary of approximately \
            {max_length} characters:\n\n{text}\n\nSummary:",
        strategy: PromptStrategy::Fold,
        max_tokens: TokenAllowance::QuarterOfMaxLength,
        temperature: 0.3,
        parse: parse_summarize,
        shape: shape_summary,
    },
    TaskSpec {
        kind: TaskKind::QuestionAnswer,
        description: "Answer `question` from the leading document context.",
        required_parameters: &["question"],
        chunk_template: "Based on the following context, please answer the question:\n\n\
            Context:\n{text}\n\nQuestion: {question}\n\nAnswer:",
        combine_template: "",
        strategy: PromptStrategy::Budgeted,
        max_tokens: TokenAllowance::Fixed(1000),
        temperature: 0.5,
        parse: parse_question_answer,
        shape: shape_answer,
    },
    TaskSpec {
        kind: TaskKind::Extract,
        description: "Extract `extraction_type` items (key_points, entities, action_items).",
        required_parameters: &[],
        chunk_template: "Please extract the {target} from the following text. List one item per \
            line:\n\n{text}\n\n{heading}:\n1.",
        combine_template: "The following lists of {target} were extracted from consecutive \
            sections of one document, in order. Merge them into a single list, removing \
            duplicates, one item per line:\n\n{text}\n\n{heading}:\n1.",
        strategy: PromptStrategy::Fold,
        max_tokens: TokenAllowance::Fixed(800),
        temperature: 0.4,
        parse: parse_extract,
        shape: shape_items,
    },
    TaskSpec {
        kind: TaskKind::Analyze,
        description: "Comprehensive analysis: topics, findings, structure, insights.",
        required_parameters: &[],
        chunk_template: "Please provide a comprehensive analysis of the following text. \
            Include:\n1. Main topics and themes\n2. Key findings or arguments\n3. Document \
            structure and organization\n4. Important insights or conclusions{focus}\n\n\
            Text:\n{text}\n\nAnalysis:",
        combine_template: "The following are analyses of consecutive sections of one document, \
            in order. Combine them into one comprehensive analysis covering main topics, key \
            findings, document structure, and important insights{focus}:\n\n{text}\n\n\
            Analysis:",
        strategy: PromptStrategy::Fold,
        max_tokens: TokenAllowance::Fixed(1500),
        temperature: 0.3,
        parse: parse_analyze,
        shape: shape_analysis,
    },
];

/// Table row for `kind`.
pub fn lookup(kind: TaskKind) -> &'static TaskSpec {
    match kind {
        TaskKind::Summarize => &TASK_TABLE[0],
        TaskKind::QuestionAnswer => &TASK_TABLE[1],
        TaskKind::Extract => &TASK_TABLE[2],
        TaskKind::Analyze => &TASK_TABLE[3],
    }
}

/// Check required parameters, then run the row's structural validation.
pub fn validate_parameters(
    spec: &TaskSpec,
    parameters: &Value,
    defaults: &ParameterDefaults,
) -> Result<TaskParameters, TaskError> {
    let empty = Map::new();
    let object = match parameters {
        Value::Null => &empty,
        Value::Object(object) => object,
        _ => {
            return Err(TaskError::validation(
                "parameters",
                "parameters must be a JSON object",
            ));
        }
    };
    for name in spec.required_parameters {
        if object.get(*name).is_none_or(Value::is_null) {
            return Err(TaskError::validation(
                format!("parameters.{name}"),
                format!("'{name}' is required for task '{}'", spec.kind),
            ));
        }
    }
    (spec.parse)(object, defaults)
}

fn render(template: &str, parameters: &TaskParameters, text: &str) -> String {
    let mut prompt = template.to_string();
    match parameters {
        TaskParameters::Summarize { max_length } => {
            prompt = prompt.replace("{max_length}", &max_length.to_string());
        }
        TaskParameters::QuestionAnswer { question } => {
            prompt = prompt.replace("{question}", question);
        }
        TaskParameters::Extract { extraction_type } => {
            prompt = prompt
                .replace("{target}", extraction_type.label())
                .replace("{heading}", extraction_heading(*extraction_type));
        }
        TaskParameters::Analyze { focus } => {
            let clause = focus
                .as_deref()
                .map(|focus| format!("\n\nPay particular attention to: {focus}"))
                .unwrap_or_default();
            prompt = prompt.replace("{focus}", &clause);
        }
    }
    // Text last, so placeholders inside document text are left alone.
    prompt.replace("{text}", text)
}

fn extraction_heading(extraction_type: ExtractionType) -> &'static str {
    match extraction_type {
        ExtractionType::KeyPoints => "Key Points",
        ExtractionType::Entities => "Entities",
        ExtractionType::ActionItems => "Action Items",
    }
}

fn parse_summarize(
    object: &Map<String, Value>,
    defaults: &ParameterDefaults,
) -> Result<TaskParameters, TaskError> {
    let max_length = match object.get("max_length") {
        None | Some(Value::Null) => defaults.summary_max_length,
        Some(value) => value
            .as_u64()
            .and_then(|length| usize::try_from(length).ok())
            .filter(|length| *length > 0)
            .ok_or_else(|| {
                TaskError::validation(
                    "parameters.max_length",
                    "max_length must be a positive integer",
                )
            })?,
    };
    Ok(TaskParameters::Summarize { max_length })
}

fn parse_question_answer(
    object: &Map<String, Value>,
    _defaults: &ParameterDefaults,
) -> Result<TaskParameters, TaskError> {
    let question = object
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|question| !question.is_empty())
        .ok_or_else(|| {
            TaskError::validation(
                "parameters.question",
                "question must be a non-empty string",
            )
        })?;
    Ok(TaskParameters::QuestionAnswer {
        question: question.to_string(),
    })
}

fn parse_extract(
    object: &Map<String, Value>,
    _defaults: &ParameterDefaults,
) -> Result<TaskParameters, TaskError> {
    let extraction_type = match object.get("extraction_type") {
        None | Some(Value::Null) => ExtractionType::KeyPoints,
        Some(value) => value
            .as_str()
            .and_then(ExtractionType::parse)
            .ok_or_else(|| {
                TaskError::validation(
                    "parameters.extraction_type",
                    "extraction_type must be one of key_points, entities, action_items",
                )
            })?,
    };
    Ok(TaskParameters::Extract { extraction_type })
}

fn parse_analyze(
    object: &Map<String, Value>,
    _defaults: &ParameterDefaults,
) -> Result<TaskParameters, TaskError> {
    let focus = match object.get("focus") {
        None | Some(Value::Null) => None,
        Some(Value::String(focus)) => Some(focus.trim().to_string()).filter(|f| !f.is_empty()),
        Some(_) => {
            return Err(TaskError::validation(
                "parameters.focus",
                "focus must be a string",
            ));
        }
    };
    Ok(TaskParameters::Analyze { focus })
}

fn shape_summary(_parameters: &TaskParameters, completion: Completion) -> TaskOutput {
    TaskOutput::Summarize {
        summary_length: completion.text.chars().count(),
        summary: completion.text,
        original_length: completion.original_length,
        chunk_count: completion.chunk_count,
        model_id: completion.model_id,
        token_usage: completion.token_usage,
    }
}

fn shape_answer(parameters: &TaskParameters, completion: Completion) -> TaskOutput {
    let question = match parameters {
        TaskParameters::QuestionAnswer { question } => question.clone(),
        _ => String::new(),
    };
    TaskOutput::QuestionAnswer {
        answer: completion.text,
        question,
        chunks_used: completion.chunks_used,
        chunks_total: completion.chunk_count,
        model_id: completion.model_id,
        token_usage: completion.token_usage,
    }
}

fn shape_items(parameters: &TaskParameters, completion: Completion) -> TaskOutput {
    let extraction_type = match parameters {
        TaskParameters::Extract { extraction_type } => *extraction_type,
        _ => ExtractionType::KeyPoints,
    };
    TaskOutput::Extract {
        items: parse_list_items(&completion.text),
        extraction_type,
        chunk_count: completion.chunk_count,
        model_id: completion.model_id,
        token_usage: completion.token_usage,
    }
}

fn shape_analysis(parameters: &TaskParameters, completion: Completion) -> TaskOutput {
    let focus = match parameters {
        TaskParameters::Analyze { focus } => focus.clone(),
        _ => None,
    };
    TaskOutput::Analyze {
        analysis: completion.text,
        focus,
        chunk_count: completion.chunk_count,
        model_id: completion.model_id,
        token_usage: completion.token_usage,
    }
}

/// Turn a generated list into items: strip numbering and bullets, drop blanks, and
/// de-duplicate case-insensitively while keeping first-seen order.
pub fn parse_list_items(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    text.lines()
        .map(strip_list_marker)
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let without_bullet = line
        .strip_prefix(['-', '*', '•'])
        .map(str::trim_start)
        .unwrap_or(line);
    let digits = without_bullet
        .chars()
        .take_while(char::is_ascii_digit)
        .count();
    if digits > 0 {
        let rest = &without_bullet[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')']) {
            return rest.trim_start();
        }
    }
    without_bullet
}
