//! Configuration types for resume splitting, extraction and scoring.
//!
//! Every knob lives in [`ParserConfig`], built through its
//! [`ParserConfigBuilder`]. Callers set only what they care about and rely on
//! the documented defaults for the rest.

use crate::error::ResumeParserError;
use crate::progress::ProgressCallback;
use crate::scoring::ScoringConfig;
use crate::splitter::{SplitOptions, DEFAULT_BOUNDARY_MARKER};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used with the OpenAI-compatible endpoint when none is given.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Base URL used when an API key is given without an endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// Credential and base URL for an OpenAI-compatible chat completion API.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub api_key: String,
    /// e.g. `https://api.deepseek.com`; `/chat/completions` is appended.
    pub base_url: String,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration for a resume parsing run.
///
/// # Example
/// ```rust
/// use resume_parser::ParserConfig;
///
/// let config = ParserConfig::builder()
///     .concurrency(4)
///     .endpoint("sk-test", "https://api.deepseek.com")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ParserConfig {
    /// Letterhead that marks the first page of each resume.
    pub boundary_marker: String,

    /// Drop pages before the first marker page. Default: true.
    ///
    /// When false those pages are kept as a run named `page_<index>`, which
    /// usually means a cover sheet gets sent to the LLM as a candidate.
    pub drop_leading_pages: bool,

    /// Number of candidates extracted at once. Default: 8.
    pub concurrency: usize,

    /// LLM model identifier. Default: `deepseek-chat`.
    pub model: String,

    /// edgequake-llm provider name (e.g. "openai", "ollama").
    /// Used when no `endpoint` is configured.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over everything else.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// OpenAI-compatible API credential and URL. Takes precedence over
    /// `provider_name`.
    pub endpoint: Option<Endpoint>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per candidate. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call LLM timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Score normalisation denominators.
    pub scoring: ScoringConfig,

    /// Receives per-candidate batch events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            boundary_marker: DEFAULT_BOUNDARY_MARKER.to_string(),
            drop_leading_pages: true,
            concurrency: 8,
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            endpoint: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            system_prompt: None,
            scoring: ScoringConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("boundary_marker", &self.boundary_marker)
            .field("drop_leading_pages", &self.drop_leading_pages)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("scoring", &self.scoring)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ParseProgressCallback>"),
            )
            .finish()
    }
}

impl ParserConfig {
    /// Create a new builder for `ParserConfig`.
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder {
            config: Self::default(),
        }
    }

    /// Splitter options derived from this configuration.
    pub fn split_options(&self) -> SplitOptions {
        SplitOptions {
            boundary_marker: self.boundary_marker.clone(),
            drop_leading_pages: self.drop_leading_pages,
        }
    }
}

/// Builder for [`ParserConfig`].
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl fmt::Debug for ParserConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ParserConfigBuilder {
    pub fn boundary_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.boundary_marker = marker.into();
        self
    }

    pub fn drop_leading_pages(mut self, v: bool) -> Self {
        self.config.drop_leading_pages = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn endpoint(mut self, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.config.endpoint = Some(Endpoint {
            api_key: api_key.into(),
            base_url: base_url.into(),
        });
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn scoring(mut self, scoring: ScoringConfig) -> Self {
        self.config.scoring = scoring;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParserConfig, ResumeParserError> {
        let c = &self.config;
        if c.boundary_marker.trim().is_empty() {
            return Err(ResumeParserError::InvalidConfig(
                "Boundary marker must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ResumeParserError::InvalidConfig("Model must not be empty".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(ResumeParserError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref ep) = c.endpoint {
            if ep.api_key.trim().is_empty() {
                return Err(ResumeParserError::InvalidConfig("API key must not be empty".into()));
            }
            if !(ep.base_url.starts_with("http://") || ep.base_url.starts_with("https://")) {
                return Err(ResumeParserError::InvalidConfig(format!(
                    "Base URL must start with http:// or https://, got '{}'",
                    ep.base_url
                )));
            }
        }
        let s = &c.scoring;
        if !(s.projects_max_points > 0.0 && s.extracurricular_max_points > 0.0) {
            return Err(ResumeParserError::InvalidConfig(format!(
                "Scoring denominators must be positive, got projects={} extracurricular={}",
                s.projects_max_points, s.extracurricular_max_points
            )));
        }
        Ok(self.config)
    }
}
