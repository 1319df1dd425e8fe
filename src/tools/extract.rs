use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{info, warn};

use crate::core::config::ExtractSettings;
use crate::core::error::{AnswerError, ExtractionError, RemoteServiceError};
use crate::core::retry::retry_bounded;
use crate::core::types::StructuredExtraction;
use crate::llm::prompts::{
    answer_user_prompt, extraction_user_prompt, ANSWER_SYSTEM_PROMPT, EXTRACTION_SYSTEM_PROMPT,
};
use crate::llm::{ChatCompletion, ChatRequest};

/// Below this many characters there is nothing worth sending to the model.
pub const MIN_EXTRACTABLE_CHARS: usize = 50;

static CODE_FENCE: OnceLock<Regex> = OnceLock::new();

fn code_fence() -> &'static Regex {
    CODE_FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("valid fence pattern")
    })
}

/// Runs structured extraction and Q&A against a [`ChatCompletion`] backend.
#[derive(Clone)]
pub struct Extractor {
    chat: Arc<dyn ChatCompletion>,
    model: String,
    settings: ExtractSettings,
}

impl Extractor {
    pub fn new(chat: Arc<dyn ChatCompletion>, model: impl Into<String>, settings: ExtractSettings) -> Self {
        Self {
            chat,
            model: model.into(),
            settings,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for a JSON object describing `text`.
    ///
    /// Short text is rejected without a remote call. Only the leading
    /// `context_chars` characters are sent. Transient remote failures are
    /// retried; a malformed reply is not.
    pub async fn extract(&self, text: &str) -> Result<StructuredExtraction, ExtractionError> {
        let chars = text.trim().chars().count();
        if chars < MIN_EXTRACTABLE_CHARS {
            return Err(ExtractionError::InsufficientContent {
                chars,
                min: MIN_EXTRACTABLE_CHARS,
            });
        }

        let request = ChatRequest {
            model: self.model.clone(),
            system_prompt: EXTRACTION_SYSTEM_PROMPT.to_string(),
            user_prompt: extraction_user_prompt(text, self.settings.context_chars),
            want_json: true,
        };

        let start = Instant::now();
        info!(
            "Sending {} characters to {} for JSON extraction",
            chars.min(self.settings.context_chars),
            self.model
        );
        let raw = self.complete(&request, "extract").await?;
        let extraction = parse_extraction(&raw)?;
        info!(
            "📦 Extracted {} field(s) in {}ms",
            extraction.len(),
            start.elapsed().as_millis()
        );
        Ok(extraction)
    }

    /// Answer `question` from `text` alone. The reply is returned trimmed.
    pub async fn answer(&self, text: &str, question: &str) -> Result<String, AnswerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }
        if text.trim().is_empty() {
            return Err(AnswerError::NoContent);
        }

        let request = ChatRequest {
            model: self.model.clone(),
            system_prompt: ANSWER_SYSTEM_PROMPT.to_string(),
            user_prompt: answer_user_prompt(text, self.settings.context_chars, question),
            want_json: false,
        };

        let preview: String = question.chars().take(50).collect();
        info!("❓ Sending Q&A request: {}", preview);
        let raw = self.complete(&request, "answer").await?;
        Ok(raw.trim().to_string())
    }

    async fn complete(&self, request: &ChatRequest, label: &str) -> Result<String, RemoteServiceError> {
        let outcome = retry_bounded(
            &self.settings.api_retry,
            label,
            RemoteServiceError::is_transient,
            |_| self.chat.complete(request),
        )
        .await;
        if let Err(e) = &outcome.result {
            warn!("{} failed after {} attempt(s): {}", label, outcome.attempts, e);
        }
        outcome.result
    }
}

/// Turn the model's reply into a [`StructuredExtraction`].
///
/// A single surrounding Markdown code fence is tolerated. Anything that is
/// not a JSON object with at least one non-null field is malformed.
pub fn parse_extraction(raw: &str) -> Result<StructuredExtraction, ExtractionError> {
    let malformed = |reason: String| ExtractionError::MalformedExtraction {
        reason,
        raw: raw.to_string(),
    };

    let trimmed = raw.trim();
    let body = code_fence()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str().trim());

    let value: Value = serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(malformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    StructuredExtraction::from_object(object)
        .ok_or_else(|| malformed("object has no non-null fields".to_string()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
