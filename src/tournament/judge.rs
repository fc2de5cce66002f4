//! The judge seam: one directional rubric comparison.
//!
//! `Judge::compare` scores the FIRST candidate against the SECOND on every
//! rubric dimension. The match executor calls it twice per match with the
//! order swapped and may retry either direction, so implementations must be
//! safe to call repeatedly.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::gateway::{ChatGateway, ChatModel, ChatRequest, GatewayError};
use crate::prompts::{PromptTemplate, DEFAULT_PROMPT};

use super::rubric::Rubric;
use super::types::Candidate;

/// Default judge model if not specified.
pub const DEFAULT_JUDGE_MODEL: &str = "openai/gpt-5-mini";

/// Output cap for a verdict: five scores plus a sentence or two of reasoning.
pub const VERDICT_MAX_OUTPUT_TOKENS_DEFAULT: u32 = 384;
pub const VERDICT_MAX_OUTPUT_TOKENS_GPT5: u32 = 1024;

pub fn verdict_max_output_tokens(model: &str) -> u32 {
    // GPT-5 spends output budget on hidden reasoning before any visible text.
    if model.starts_with("openai/gpt-5") {
        VERDICT_MAX_OUTPUT_TOKENS_GPT5
    } else {
        VERDICT_MAX_OUTPUT_TOKENS_DEFAULT
    }
}

// =============================================================================
// Verdicts and errors
// =============================================================================

/// Per-dimension scores for the first-listed candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    /// Dimension id to score in [0, 1]; 1.0 means FIRST is clearly better.
    pub dimension_scores: HashMap<String, f64>,
    pub reasoning: String,
    pub latency_ms: u64,
}

impl JudgeVerdict {
    /// Check that every rubric dimension has a finite score in [0, 1].
    /// Dimensions the rubric does not know are ignored.
    pub fn validate(&self, rubric: &Rubric) -> Result<(), JudgeError> {
        for d in rubric.dimensions() {
            match self.dimension_scores.get(&d.id) {
                None => {
                    return Err(JudgeError::Malformed(format!(
                        "missing score for dimension '{}'",
                        d.id
                    )))
                }
                Some(s) if !s.is_finite() || !(0.0..=1.0).contains(s) => {
                    return Err(JudgeError::Malformed(format!(
                        "score for dimension '{}' out of range [0,1]: {s}",
                        d.id
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("judge call timed out after {0}ms")]
    Timeout(u64),
    #[error("malformed judge response: {0}")]
    Malformed(String),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("judge unavailable: {0}")]
    Unavailable(String),
}

impl JudgeError {
    /// Short stable label for traces and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::Timeout(_) => "timeout",
            JudgeError::Malformed(_) => "malformed",
            JudgeError::Gateway(e) => e.code(),
            JudgeError::Unavailable(_) => "unavailable",
        }
    }

    /// Every failure gets its retry except gateway configuration errors.
    /// Refusals and garbled provider replies are not deterministic, so they
    /// are retried too.
    pub fn is_retryable(&self) -> bool {
        match self {
            JudgeError::Gateway(e) => !e.is_configuration_error(),
            _ => true,
        }
    }
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn compare(
        &self,
        user_input: &str,
        first: &Candidate,
        second: &Candidate,
        rubric: &Rubric,
    ) -> Result<JudgeVerdict, JudgeError>;
}

#[async_trait]
impl<J: Judge + ?Sized> Judge for std::sync::Arc<J> {
    async fn compare(
        &self,
        user_input: &str,
        first: &Candidate,
        second: &Candidate,
        rubric: &Rubric,
    ) -> Result<JudgeVerdict, JudgeError> {
        (**self).compare(user_input, first, second, rubric).await
    }
}

// =============================================================================
// JSON parsing
// =============================================================================

/// Raw JSON structure from LLM response.
#[derive(Debug, Deserialize)]
struct VerdictJson {
    #[serde(default)]
    scores: Option<HashMap<String, f64>>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    refused: Option<bool>,
}

/// Parse an LLM reply into validated scores and reasoning.
pub fn parse_verdict_response(
    raw: &str,
    rubric: &Rubric,
) -> Result<(HashMap<String, f64>, String), JudgeError> {
    let json_str = extract_json(raw);
    let parsed: VerdictJson =
        serde_json::from_str(json_str).map_err(|e| JudgeError::Malformed(e.to_string()))?;

    if parsed.refused.unwrap_or(false) {
        return Err(JudgeError::Malformed("model refused to judge".into()));
    }
    let scores = parsed
        .scores
        .ok_or_else(|| JudgeError::Malformed("missing 'scores'".into()))?;

    let verdict = JudgeVerdict {
        dimension_scores: scores,
        reasoning: parsed.reasoning.unwrap_or_default(),
        latency_ms: 0,
    };
    verdict.validate(rubric)?;
    Ok((verdict.dimension_scores, verdict.reasoning))
}

/// Extract the first balanced JSON object from a reply that may carry
/// surrounding prose or code fences. Braces inside strings are skipped.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find('{') else {
        return trimmed;
    };
    let remainder = &trimmed[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &remainder[..=i];
                }
            }
            _ => {}
        }
    }
    trimmed
}

// =============================================================================
// LLM judge
// =============================================================================

/// Judge backed by a chat model.
pub struct LlmJudge<G: ChatGateway> {
    gateway: G,
    model: String,
    template: PromptTemplate,
    max_tokens: Option<u32>,
}

impl<G: ChatGateway> LlmJudge<G> {
    pub fn new(gateway: G, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
            template: DEFAULT_PROMPT,
            max_tokens: None,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl<G: ChatGateway> Judge for LlmJudge<G> {
    async fn compare(
        &self,
        user_input: &str,
        first: &Candidate,
        second: &Candidate,
        rubric: &Rubric,
    ) -> Result<JudgeVerdict, JudgeError> {
        let prompt = self.template.render(user_input, rubric, first, second);

        let mut request = ChatRequest::new(
            ChatModel::openrouter(&self.model),
            prompt.to_messages(),
            "bracket::judge",
        )
        .max_tokens(
            self.max_tokens
                .unwrap_or_else(|| verdict_max_output_tokens(&self.model)),
        );
        // Only OpenAI models reliably support response_format=json_object via OpenRouter.
        if self.model.starts_with("openai/") {
            request = request.json();
        }

        let started = Instant::now();
        let response = self.gateway.chat(request).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (dimension_scores, reasoning) =
            parse_verdict_response(&response.content, rubric).inspect_err(|e| {
                warn!(
                    error = %e,
                    model = %self.model,
                    first = %first.id,
                    second = %second.id,
                    "unusable judge reply"
                );
            })?;

        Ok(JudgeVerdict {
            dimension_scores,
            reasoning,
            latency_ms,
        })
    }
}
