//! LLM field extraction: turn resume text into a [`CandidateRecord`].
//!
//! [`ChatBackend`] is the seam between the pipeline and a chat completion
//! API. Two implementations ship with the crate:
//!
//! * [`OpenAiCompatibleBackend`]: direct `reqwest` client for any
//!   OpenAI-style `/chat/completions` endpoint (DeepSeek by default), with
//!   JSON response format requested.
//! * [`ProviderBackend`]: any `edgequake_llm` provider.
//!
//! [`FieldExtractor`] owns one backend plus retry and timeout settings. It is
//! built once per run and passed by reference to every extraction.
//!
//! ## Retry Strategy
//!
//! Transport errors, 429, 5xx, timeouts and empty replies are retried with
//! exponential backoff (`retry_backoff_ms * 2^(attempt-1)`). Auth failures and
//! schema violations are returned at once; asking again will not fix them.

use crate::config::{Endpoint, ParserConfig, DEFAULT_BASE_URL};
use crate::error::{ExtractionError, ResumeParserError};
use crate::model::{CandidateRecord, TokenUsage};
use crate::prompts::{candidate_message, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// One completion: the text and its token counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A chat completion API that takes one system and one user message.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Short name for logs and error messages.
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply, ExtractionError>;
}

// ── OpenAI-compatible HTTP backend ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Direct client for `POST {base_url}/chat/completions`.
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    endpoint: Endpoint,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        endpoint: Endpoint,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<Self, ResumeParserError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ResumeParserError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            temperature,
            max_tokens,
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply, ExtractionError> {
        let body = self.request_body(system, user).to_string();

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.endpoint.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ExtractionError::Backend {
                backend: self.model.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ExtractionError::Backend {
            backend: self.model.clone(),
            detail: e.to_string(),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(match status.as_u16() {
                401 | 403 => ExtractionError::Auth {
                    backend: self.model.clone(),
                    detail: message,
                },
                429 => ExtractionError::RateLimited {
                    backend: self.model.clone(),
                },
                code => ExtractionError::Api {
                    status: code,
                    message,
                },
            });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| ExtractionError::Backend {
                backend: self.model.clone(),
                detail: format!("malformed completion body: {e}"),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let (prompt_tokens, completion_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(ChatReply {
            content,
            prompt_tokens,
            completion_tokens,
        })
    }
}

// ── edgequake-llm provider backend ───────────────────────────────────────────

/// Adapter over any `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
}

impl ProviderBackend {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        label: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            provider,
            label: label.into(),
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl ChatBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply, ExtractionError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ExtractionError::Backend {
                backend: self.label.clone(),
                detail: e.to_string(),
            })?;

        Ok(ChatReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens as u64,
            completion_tokens: response.completion_tokens as u64,
        })
    }
}

// ── Extractor ────────────────────────────────────────────────────────────────

/// Explicitly constructed extraction client.
#[derive(Clone)]
pub struct FieldExtractor {
    backend: Arc<dyn ChatBackend>,
    system_prompt: String,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl std::fmt::Debug for FieldExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldExtractor")
            .field("backend", &self.backend.name())
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl FieldExtractor {
    /// Wrap an existing backend, taking retry and prompt settings from `config`.
    pub fn with_backend(backend: Arc<dyn ChatBackend>, config: &ParserConfig) -> Self {
        Self {
            backend,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve a backend from the configuration.
    ///
    /// 1. **Pre-built provider** (`config.provider`), used as-is.
    /// 2. **Endpoint** (`config.endpoint`): OpenAI-compatible HTTP client.
    /// 3. **Named provider** (`config.provider_name`) through
    ///    [`ProviderFactory::create_llm_provider`] with `config.model`.
    /// 4. **`DEEPSEEK_API_KEY`** in the environment, with `DEEPSEEK_URL` or the
    ///    default DeepSeek base URL.
    /// 5. **`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`**, both set.
    /// 6. **Auto-detection** via [`ProviderFactory::from_env`].
    pub fn from_config(config: &ParserConfig) -> Result<Self, ResumeParserError> {
        let backend = resolve_backend(config)?;
        info!("LLM backend: {}", backend.name());
        Ok(Self::with_backend(backend, config))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Extract a candidate record from the full resume text.
    ///
    /// `reg_no` in the returned usage is taken from the extracted metadata.
    pub async fn extract(&self, text: &str) -> Result<(CandidateRecord, TokenUsage), ExtractionError> {
        let start = Instant::now();
        let user = candidate_message(text);
        let mut last_err: Option<ExtractionError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.backend.name(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.attempt(&user).await {
                Ok((record, reply)) => {
                    debug!(
                        "{}: {} prompt tokens, {} completion tokens, {:?}",
                        self.backend.name(),
                        reply.prompt_tokens,
                        reply.completion_tokens,
                        start.elapsed()
                    );
                    let usage = TokenUsage {
                        reg_no: record.metadata.reg_no.clone(),
                        prompt_tokens: reply.prompt_tokens,
                        completion_tokens: reply.completion_tokens,
                        total_tokens: reply.prompt_tokens + reply.completion_tokens,
                    };
                    return Ok((record, usage));
                }
                Err(e) if e.is_retryable() => {
                    warn!("{}: attempt {} failed: {}", self.backend.name(), attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(ExtractionError::EmptyResponse))
    }

    async fn attempt(&self, user: &str) -> Result<(CandidateRecord, ChatReply), ExtractionError> {
        let call = self.backend.complete(&self.system_prompt, user);
        let reply = timeout(Duration::from_secs(self.api_timeout_secs), call)
            .await
            .map_err(|_| ExtractionError::Timeout {
                secs: self.api_timeout_secs,
            })??;

        if reply.content.trim().is_empty() {
            return Err(ExtractionError::EmptyResponse);
        }
        let record = parse_candidate_json(&reply.content)?;
        Ok((record, reply))
    }
}

fn resolve_backend(config: &ParserConfig) -> Result<Arc<dyn ChatBackend>, ResumeParserError> {
    let wrap = |provider: Arc<dyn LLMProvider>, label: String| -> Arc<dyn ChatBackend> {
        Arc::new(ProviderBackend::new(
            provider,
            label,
            config.temperature,
            config.max_tokens,
        ))
    };

    if let Some(ref provider) = config.provider {
        return Ok(wrap(Arc::clone(provider), config.model.clone()));
    }

    if let Some(ref endpoint) = config.endpoint {
        return openai_compatible(endpoint.clone(), config);
    }

    if let Some(ref name) = config.provider_name {
        let provider = create_provider(name, &config.model)?;
        return Ok(wrap(provider, format!("{name}/{}", config.model)));
    }

    if let Ok(api_key) = std::env::var("DEEPSEEK_API_KEY") {
        if !api_key.is_empty() {
            let base_url = std::env::var("DEEPSEEK_URL")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
            return openai_compatible(Endpoint { api_key, base_url }, config);
        }
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_provider(&prov, &model)?;
            return Ok(wrap(provider, format!("{prov}/{model}")));
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ResumeParserError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be detected from the environment.\n\
                Set DEEPSEEK_API_KEY (and optionally DEEPSEEK_URL), or OPENAI_API_KEY.\n\
                Error: {e}"
            ),
        })?;
    Ok(wrap(provider, "auto".to_string()))
}

fn openai_compatible(
    endpoint: Endpoint,
    config: &ParserConfig,
) -> Result<Arc<dyn ChatBackend>, ResumeParserError> {
    Ok(Arc::new(OpenAiCompatibleBackend::new(
        endpoint,
        config.model.clone(),
        config.temperature,
        config.max_tokens,
    )?))
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ResumeParserError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ResumeParserError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

// ── Response parsing ─────────────────────────────────────────────────────────

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n?(.*?)\n?```$").unwrap());

/// Remove an outer Markdown code fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_CODE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => trimmed,
    }
}

/// Strictly deserialise a model reply into a [`CandidateRecord`].
pub fn parse_candidate_json(raw: &str) -> Result<CandidateRecord, ExtractionError> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|e| ExtractionError::SchemaViolation {
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const VALID: &str = r#"{
        "metadata": {"name": "Asha Rao", "gender": "F", "reg_no": "221CS101", "dob": "NA",
                     "email": "asha@example.com", "phone": "NA", "mobile": "9876543210",
                     "branch": "CSE", "degree": "B.Tech"},
        "academic_performance": [{"semester": 1, "duration": "Dec 2022", "sgpa": 9.0, "cgpa": 9.0, "degree": "B.Tech"}],
        "projects": [],
        "technical_skills": {"programming_languages": ["Rust"]}
    }"#;

    /// Replays a fixed script of replies, one per call.
    struct Scripted {
        replies: Mutex<VecDeque<Result<ChatReply, ExtractionError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ChatReply, ExtractionError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<ChatReply, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ExtractionError::EmptyResponse))
        }
    }

    fn reply(content: &str) -> Result<ChatReply, ExtractionError> {
        Ok(ChatReply {
            content: content.to_string(),
            prompt_tokens: 1200,
            completion_tokens: 300,
        })
    }

    fn extractor(backend: Arc<Scripted>) -> FieldExtractor {
        let config = ParserConfig::builder()
            .max_retries(2)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        FieldExtractor::with_backend(backend, &config)
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn parse_rejects_partial_record() {
        let err = parse_candidate_json(r#"{"metadata": {"name": "x"}}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn extract_returns_record_and_usage() {
        let backend = Scripted::new(vec![reply(&format!("```json\n{VALID}\n```"))]);
        let (record, usage) = extractor(backend).extract("resume text").await.unwrap();
        assert_eq!(record.metadata.reg_no, "221CS101");
        assert_eq!(usage.reg_no, "221CS101");
        assert_eq!(usage.total_tokens, 1500);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let backend = Scripted::new(vec![
            Err(ExtractionError::RateLimited {
                backend: "scripted".into(),
            }),
            reply("   "),
            reply(VALID),
        ]);
        let ex = extractor(backend.clone());
        assert!(ex.extract("resume").await.is_ok());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn schema_violation_is_not_retried() {
        let backend = Scripted::new(vec![reply("{\"not\": \"a record\"}"), reply(VALID)]);
        let ex = extractor(backend.clone());
        let err = ex.extract("resume").await.unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaViolation { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let backend = Scripted::new(vec![
            Err(ExtractionError::Timeout { secs: 1 }),
            Err(ExtractionError::Timeout { secs: 1 }),
            Err(ExtractionError::Timeout { secs: 1 }),
            reply(VALID),
        ]);
        let ex = extractor(backend.clone());
        let err = ex.extract("resume").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn request_body_asks_for_json() {
        let backend = OpenAiCompatibleBackend::new(
            Endpoint {
                api_key: "k".into(),
                base_url: "https://api.deepseek.com/".into(),
            },
            "deepseek-chat",
            0.0,
            4096,
        )
        .unwrap();
        assert_eq!(backend.url(), "https://api.deepseek.com/chat/completions");
        let body = backend.request_body("sys", "user");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["model"], "deepseek-chat");
    }

    #[test]
    fn endpoint_config_selects_http_backend() {
        let config = ParserConfig::builder()
            .endpoint("sk-test", "https://api.deepseek.com")
            .build()
            .unwrap();
        let ex = FieldExtractor::from_config(&config).unwrap();
        assert_eq!(ex.backend_name(), "deepseek-chat");
    }
}
