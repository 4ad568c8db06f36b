//! LLM-backed judge: prompt rendering, response parsing, retry and caching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{JudgmentCache, JudgmentCacheKey};
use crate::gateway::{ChatGateway, ChatRequest};
use crate::prompts::{prompt_by_slug, PromptTemplate, DEFAULT_PROMPT};

use super::{CacheMode, EvaluationSample, Judge, JudgeError, Judgment};

/// Hard cap on generation for a single judgment.
pub const JUDGMENT_MAX_OUTPUT_TOKENS: u32 = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Further attempts after a failed one.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub json_mode: bool,
    pub prompt_template_slug: Option<String>,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: JUDGMENT_MAX_OUTPUT_TOKENS,
            max_retries: 1,
            retry_delay_ms: 500,
            json_mode: true,
            prompt_template_slug: None,
        }
    }
}

impl JudgeSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn template(&self) -> PromptTemplate {
        self.prompt_template_slug
            .as_deref()
            .and_then(prompt_by_slug)
            .unwrap_or(DEFAULT_PROMPT)
    }
}

pub struct LlmJudge<G: ChatGateway> {
    gateway: Arc<G>,
    cache: Option<Arc<dyn JudgmentCache>>,
    settings: JudgeSettings,
    template: PromptTemplate,
    template_hash: String,
}

impl<G: ChatGateway> LlmJudge<G> {
    pub fn new(gateway: Arc<G>, settings: JudgeSettings) -> Self {
        let template = settings.template();
        let template_hash = template.hash();
        Self {
            gateway,
            cache: None,
            settings,
            template,
            template_hash,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn JudgmentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    fn cache_key(&self, sample: &EvaluationSample) -> JudgmentCacheKey {
        JudgmentCacheKey::new(
            &self.settings.model,
            self.template.slug,
            &self.template_hash,
            sample,
        )
    }

    async fn attempt(&self, sample: &EvaluationSample) -> Result<Judgment, JudgeError> {
        let prompt = self
            .template
            .render(&sample.input, &sample.output, &sample.criteria);
        let mut request = ChatRequest::new(self.settings.model.clone(), prompt.to_messages())
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens);
        if self.settings.json_mode {
            request = request.json();
        }

        let response = self.gateway.chat(request).await?;
        debug!(
            model = %self.settings.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            latency_ms = response.latency.as_millis() as u64,
            "Judge call completed"
        );
        parse_judgment_response(&response.content)
    }
}

#[async_trait]
impl<G: ChatGateway> Judge for LlmJudge<G> {
    async fn try_evaluate(
        &self,
        sample: &EvaluationSample,
        mode: CacheMode,
    ) -> Result<Judgment, JudgeError> {
        let cache = match mode {
            CacheMode::Use => self.cache.as_deref(),
            CacheMode::Bypass => None,
        };
        let key = cache.map(|_| self.cache_key(sample));

        if let (Some(cache), Some(key)) = (cache, key.as_ref()) {
            match cache.get(key).await {
                Ok(Some(hit)) => {
                    debug!(key = %key.key_hash, "Judgment cache hit");
                    return Ok(hit);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "Cache read failed; falling back to live judgment");
                }
            }
        }

        let mut attempt = 0;
        let judgment = loop {
            match self.attempt(sample).await {
                Ok(judgment) => break judgment,
                Err(err) if err.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %err,
                        code = err.code(),
                        request_id = err.request_id().unwrap_or("-"),
                        attempt,
                        "Judge attempt failed; retrying"
                    );
                    tokio::time::sleep(self.settings.retry_delay()).await;
                }
                Err(err) => return Err(err),
            }
        };

        if let (Some(cache), Some(key)) = (cache, key.as_ref()) {
            if let Err(err) = cache.put(key, &judgment).await {
                warn!(error = %err, "Cache write failed");
            }
        }

        Ok(judgment)
    }
}

// =============================================================================
// JSON parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct JudgmentJson {
    #[serde(default)]
    passed: Option<Value>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse a model response into a [`Judgment`].
///
/// Tolerates prose around the JSON object. `passed` may be a boolean or one
/// of `yes`/`no`/`pass`/`fail`/`true`/`false`.
pub fn parse_judgment_response(raw: &str) -> Result<Judgment, JudgeError> {
    let json_str = extract_json(raw);

    let parsed: JudgmentJson =
        serde_json::from_str(json_str).map_err(|e| JudgeError::Parse(e.to_string()))?;

    let passed = parsed
        .passed
        .ok_or_else(|| JudgeError::Parse("missing 'passed'".into()))?;
    let passed = match &passed {
        Value::Bool(b) => *b,
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "pass" | "passed" => true,
            "false" | "no" | "fail" | "failed" => false,
            other => return Err(JudgeError::Parse(format!("invalid 'passed': {other}"))),
        },
        other => return Err(JudgeError::Parse(format!("invalid 'passed': {other}"))),
    };
    let confidence = parsed
        .confidence
        .ok_or_else(|| JudgeError::Parse("missing 'confidence'".into()))?;
    if !confidence.is_finite() {
        return Err(JudgeError::Parse(format!(
            "non-finite confidence: {confidence}"
        )));
    }

    Ok(Judgment::new(
        passed,
        confidence,
        parsed.reasoning.unwrap_or_default(),
    ))
}

/// First balanced `{...}` object in the response, or the trimmed input.
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
