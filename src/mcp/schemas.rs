//! JSON schema builders for MCP tools.

use serde_json::{Map, Value};

const TASK_NAMES: [&str; 4] = ["summarize", "question_answer", "extract", "analyze"];
const EXTRACTION_TYPES: [&str; 3] = ["key_points", "entities", "action_items"];

/// Build the schema describing the `process-document` tool input.
pub(crate) fn process_document_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "document_path".into(),
        string_schema("Path to a PDF readable by the server process"),
    );
    properties.insert(
        "task".into(),
        enum_schema("Task to run over the document", &TASK_NAMES, None),
    );

    let mut parameters_schema = Map::new();
    parameters_schema.insert("type".into(), Value::String("object".into()));
    parameters_schema.insert(
        "description".into(),
        Value::String(
            "Task parameters: max_length (summarize), question (question_answer), \
             extraction_type (extract), focus (analyze)"
                .into(),
        ),
    );
    properties.insert("parameters".into(), Value::Object(parameters_schema));
    properties.insert("request_id".into(), request_id_schema());

    finalize_object_schema(properties, &["document_path", "task"])
}

/// Build the schema describing the `summarize-text` tool input.
pub(crate) fn summarize_text_input_schema() -> Map<String, Value> {
    let mut properties = text_properties();

    let mut max_length_schema = Map::new();
    max_length_schema.insert("type".into(), Value::String("integer".into()));
    max_length_schema.insert(
        "description".into(),
        Value::String("Approximate summary length in characters".into()),
    );
    max_length_schema.insert("minimum".into(), Value::Number(1.into()));
    properties.insert("max_length".into(), Value::Object(max_length_schema));

    finalize_object_schema(properties, &["text"])
}

/// Build the schema describing the `answer-question` tool input.
pub(crate) fn answer_question_input_schema() -> Map<String, Value> {
    let mut properties = text_properties();
    properties.insert(
        "question".into(),
        string_schema("Question to answer from the supplied text"),
    );
    finalize_object_schema(properties, &["text", "question"])
}

/// Build the schema describing the `extract-key-points` tool input.
pub(crate) fn extract_input_schema() -> Map<String, Value> {
    let mut properties = text_properties();
    properties.insert(
        "extraction_type".into(),
        enum_schema(
            "What to extract (default: 'key_points')",
            &EXTRACTION_TYPES,
            Some("key_points"),
        ),
    );
    finalize_object_schema(properties, &["text"])
}

/// Build the schema describing the `analyze-text` tool input.
pub(crate) fn analyze_input_schema() -> Map<String, Value> {
    let mut properties = text_properties();
    properties.insert(
        "focus".into(),
        string_schema("Optional aspect the analysis should emphasise"),
    );
    finalize_object_schema(properties, &["text"])
}

/// Build the schema describing the `generate` tool input.
pub(crate) fn generate_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("prompt".into(), string_schema("Prompt sent to the model verbatim"));

    let mut max_tokens_schema = Map::new();
    max_tokens_schema.insert("type".into(), Value::String("integer".into()));
    max_tokens_schema.insert(
        "description".into(),
        Value::String("Generated-token limit (default: 2048)".into()),
    );
    max_tokens_schema.insert("minimum".into(), Value::Number(1.into()));
    properties.insert("max_tokens".into(), Value::Object(max_tokens_schema));

    let mut temperature_schema = Map::new();
    temperature_schema.insert("type".into(), Value::String("number".into()));
    temperature_schema.insert(
        "description".into(),
        Value::String("Sampling temperature; 0 selects greedy decoding (default: 0.7)".into()),
    );
    temperature_schema.insert("minimum".into(), Value::Number(0.into()));
    temperature_schema.insert("maximum".into(), Value::Number(2.into()));
    properties.insert("temperature".into(), Value::Object(temperature_schema));

    finalize_object_schema(properties, &["prompt"])
}

/// Schema representing an empty object (used for parameterless tools).
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

fn text_properties() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("text".into(), string_schema("Text to process"));
    properties.insert(
        "label".into(),
        string_schema("Optional name reported as the document's file name"),
    );
    properties.insert("request_id".into(), request_id_schema());
    properties
}

fn request_id_schema() -> Value {
    string_schema("Optional request identifier; a UUID is generated when omitted")
}

fn enum_schema(description: &str, variants: &[&str], default: Option<&str>) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    schema.insert(
        "enum".into(),
        Value::Array(
            variants
                .iter()
                .map(|&variant| Value::String(variant.into()))
                .collect(),
        ),
    );
    if let Some(default) = default {
        schema.insert("default".into(), Value::String(default.into()));
    }
    Value::Object(schema)
}

fn string_schema(description: &str) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    Value::Object(schema)
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
