//! Configuration types for the extraction pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`] and passed explicitly to every stage — no
//! stage reads ambient or global state. Keeping every knob in one struct
//! makes it trivial to share configs across tasks, log them, and diff two
//! runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::PdfsightError;
use crate::progress::PipelineProgressCallback;
use crate::retry::RetryPolicy;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a PDF-to-text pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfsight::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_concurrent_requests(10)
///     .model("gpt-4.1-nano")
///     .scan_all_pages(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Number of in-flight vision calls per batch window. Range: 1–1000. Default: 5.
    ///
    /// Images are dispatched in fixed windows of this size; window K+1 never
    /// starts before window K fully settles, so this bounds peak concurrency
    /// exactly. Raise it when the provider is fast and rate limits are
    /// generous; lower it on `429` errors.
    pub max_concurrent_requests: usize,

    /// Maximum retry attempts on a transient model-API failure. Default: 3.
    ///
    /// Most 5xx and timeout errors are transient (overloaded backend, network
    /// blip). Retrying 3 times catches the vast majority without blocking the
    /// batch for long.
    pub max_retries: u32,

    /// Maximum re-analysis rounds when the model refuses to describe an
    /// image. Range: 0–5. Default: 1.
    ///
    /// A refusal retry re-runs the full vision call (with its own transient
    /// retries), then re-classifies the new answer. After exhaustion the
    /// image is marked refused and contributes no text downstream.
    pub max_refusal_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt and caps at `max_backoff_ms`: 500 ms → 1 s
    /// → 2 s → 4 s → 8 s. Exponential backoff avoids the thundering-herd
    /// problem where N concurrent workers retry simultaneously against a
    /// recovering endpoint.
    pub retry_backoff_ms: u64,

    /// Ceiling on any single backoff delay in milliseconds. Default: 8000.
    pub max_backoff_ms: u64,

    /// Sampling temperature for the vision completion. Range: 0–1. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what it sees — exactly
    /// what you want for description and transcription.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 1024.
    ///
    /// Dense full-page scans can exceed 700 output tokens. Setting this too
    /// low silently truncates descriptions mid-sentence.
    pub max_tokens: usize,

    /// Render a forced full-page scan for every page, regardless of what the
    /// classifier thinks. Default: false.
    ///
    /// Forced scans bypass the blankness check, so even a text-only or empty
    /// page yields exactly one scan image.
    pub scan_all_pages: bool,

    /// Which prompt family drives the analysis. Default: [`AnalysisType::General`].
    pub analysis_type: AnalysisType,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Templates applied when substituting model output into placeholders.
    pub templates: ReplacementTemplates,

    /// Structured progress events, fired as each stage and item completes.
    pub progress_callback: Option<Arc<dyn PipelineProgressCallback>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            max_concurrent_requests: 5,
            max_retries: 3,
            max_refusal_retries: 1,
            retry_backoff_ms: 500,
            max_backoff_ms: 8_000,
            temperature: 0.1,
            max_tokens: 1024,
            scan_all_pages: false,
            analysis_type: AnalysisType::default(),
            password: None,
            download_timeout_secs: 120,
            templates: ReplacementTemplates::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("max_retries", &self.max_retries)
            .field("max_refusal_retries", &self.max_refusal_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("scan_all_pages", &self.scan_all_pages)
            .field("analysis_type", &self.analysis_type)
            .field("templates", &self.templates)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Backoff policy for transient model-call failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_ms: self.retry_backoff_ms,
            max_delay_ms: self.max_backoff_ms,
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
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

    pub fn max_concurrent_requests(mut self, n: usize) -> Self {
        self.config.max_concurrent_requests = n.clamp(1, 1000);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn max_refusal_retries(mut self, n: u32) -> Self {
        self.config.max_refusal_retries = n.min(5);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn scan_all_pages(mut self, v: bool) -> Self {
        self.config.scan_all_pages = v;
        self
    }

    pub fn analysis_type(mut self, t: AnalysisType) -> Self {
        self.config.analysis_type = t;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn templates(mut self, templates: ReplacementTemplates) -> Self {
        self.config.templates = templates;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn PipelineProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PdfsightError> {
        let c = &self.config;
        if c.max_concurrent_requests == 0 || c.max_concurrent_requests > 1000 {
            return Err(PdfsightError::InvalidConfig(format!(
                "max_concurrent_requests must be 1–1000, got {}",
                c.max_concurrent_requests
            )));
        }
        if c.max_refusal_retries > 5 {
            return Err(PdfsightError::InvalidConfig(format!(
                "max_refusal_retries must be 0–5, got {}",
                c.max_refusal_retries
            )));
        }
        if !(0.0..=1.0).contains(&c.temperature) {
            return Err(PdfsightError::InvalidConfig(format!(
                "temperature must be 0–1, got {}",
                c.temperature
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which prompt family the orchestrator uses per image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// Describe embedded images; transcribe full-page scans. (default)
    #[default]
    General,
    /// Summarise each scan as a whole-page description.
    PageDescription,
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(AnalysisType::General),
            "page_description" => Ok(AnalysisType::PageDescription),
            other => Err(format!(
                "unknown analysis type '{other}' (expected 'general' or 'page_description')"
            )),
        }
    }
}

/// Template strings applied during placeholder replacement.
///
/// All templates recognise the `{pageNumber}` token and literal `\n` escape
/// sequences, which are expanded before substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementTemplates {
    /// Optional banner inserted above each page's text.
    pub page_heading: Option<String>,
    /// Wrapped around an embedded image's description.
    pub image_prefix: String,
    pub image_suffix: String,
    /// Wrapped around a full-page scan's text.
    pub scan_prefix: String,
    pub scan_suffix: String,
    /// Joined between consecutive pages in the assembled document.
    pub page_separator: String,
}

impl Default for ReplacementTemplates {
    fn default() -> Self {
        Self {
            page_heading: None,
            image_prefix: "[Image: ".to_string(),
            image_suffix: "]".to_string(),
            scan_prefix: String::new(),
            scan_suffix: String::new(),
            page_separator: "\n\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = PipelineConfig::builder()
            .max_concurrent_requests(5000)
            .max_refusal_retries(99)
            .temperature(3.0)
            .build()
            .unwrap();
        assert_eq!(c.max_concurrent_requests, 1000);
        assert_eq!(c.max_refusal_retries, 5);
        assert_eq!(c.temperature, 1.0);
    }

    #[test]
    fn builder_zero_concurrency_clamps_to_one() {
        let c = PipelineConfig::builder()
            .max_concurrent_requests(0)
            .build()
            .unwrap();
        assert_eq!(c.max_concurrent_requests, 1);
    }

    #[test]
    fn retry_policy_reflects_config() {
        let c = PipelineConfig::builder()
            .max_retries(5)
            .retry_backoff_ms(250)
            .build()
            .unwrap();
        let p = c.retry_policy();
        assert_eq!(p.max_retries, 5);
        assert_eq!(p.base_delay_ms, 250);
        assert_eq!(p.max_delay_ms, 8_000);
    }

    #[test]
    fn analysis_type_parses() {
        assert_eq!(
            "general".parse::<AnalysisType>().unwrap(),
            AnalysisType::General
        );
        assert_eq!(
            "page_description".parse::<AnalysisType>().unwrap(),
            AnalysisType::PageDescription
        );
        assert!("markdown".parse::<AnalysisType>().is_err());
    }

    #[test]
    fn default_templates_wrap_images_only() {
        let t = ReplacementTemplates::default();
        assert_eq!(t.image_prefix, "[Image: ");
        assert!(t.scan_prefix.is_empty());
        assert!(t.page_heading.is_none());
    }
}
