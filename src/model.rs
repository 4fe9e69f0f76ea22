//! Vision-model access: a narrow trait over the LLM provider.
//!
//! The orchestrator and refusal detector never talk to `edgequake_llm`
//! directly — they go through [`VisionModel`], a two-method capability
//! interface (`describe_image` for vision calls, `complete` for text-only
//! classification). The indirection buys two things:
//!
//! * orchestration logic is testable against a mock model with scripted
//!   responses, failures, and refusals;
//! * the provider integration lives in exactly one adapter
//!   ([`EdgequakeVision`]) and can change without touching retry, windowing,
//!   or refusal handling.
//!
//! The pipeline imposes no timeout of its own on model calls — a
//! caller-supplied provider is the place to bound call duration.

use crate::config::PipelineConfig;
use crate::error::PdfsightError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A failed model call. Always retryable from the pipeline's perspective;
/// the retry policy decides how often to try.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// One vision request: prompt + encoded image + sampling parameters.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub image: ImageData,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Capability interface over a vision-capable language model.
pub trait VisionModel: Send + Sync {
    /// Send an image with a prompt; return the model's textual response.
    fn describe_image<'a>(
        &'a self,
        request: &'a VisionRequest,
    ) -> BoxFuture<'a, Result<String, ModelError>>;

    /// Text-only completion, used by the refusal classifier.
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ModelError>>;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct EdgequakeVision {
    provider: Arc<dyn LLMProvider>,
}

impl EdgequakeVision {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

impl VisionModel for EdgequakeVision {
    /// ## Message layout
    ///
    /// 1. **System message** — the analysis prompt
    /// 2. **User message** — the image as a base64 attachment (empty text)
    ///
    /// The empty user text is intentional: VLM APIs require at least one
    /// user turn to respond to, but the image carries all the content.
    fn describe_image<'a>(
        &'a self,
        request: &'a VisionRequest,
    ) -> BoxFuture<'a, Result<String, ModelError>> {
        async move {
            let messages = vec![
                ChatMessage::system(&request.prompt),
                ChatMessage::user_with_images("", vec![request.image.clone()]),
            ];
            let options = CompletionOptions {
                temperature: Some(request.temperature),
                max_tokens: Some(request.max_tokens),
                ..Default::default()
            };
            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| ModelError(e.to_string()))?;
            debug!(
                "vision call: {} input tokens, {} output tokens",
                response.prompt_tokens, response.completion_tokens
            );
            Ok(response.content)
        }
        .boxed()
    }

    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ModelError>> {
        async move {
            let messages = vec![ChatMessage::user(prompt)];
            // Classification wants determinism and a one-word answer.
            let options = CompletionOptions {
                temperature: Some(0.0),
                max_tokens: Some(8),
                ..Default::default()
            };
            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| ModelError(e.to_string()))?;
            Ok(response.content)
        }
        .boxed()
    }
}

/// Resolve the vision model from the config, most-specific to least-specific.
///
/// The fallback chain lets library users and CLI users each set exactly as
/// much or as little as they need:
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed and
///    configured the provider entirely; we use it as-is. Useful in tests or
///    when the caller needs custom middleware (caching, rate-limiting,
///    timeouts).
///
/// 2. **Named provider + model** (`config.provider_name`) — the caller named
///    a provider (e.g. `"openai"`) and optional model. We call
///    [`ProviderFactory::create_llm_provider`] which reads the corresponding
///    API key (`OPENAI_API_KEY`, etc.) from the environment.
///
/// 3. **Environment pair** (`PDFSIGHT_LLM_PROVIDER` + `PDFSIGHT_MODEL`) —
///    both env vars set means the caller chose a provider and model at the
///    execution-environment level (Makefile, shell script, CI). Checked
///    before full auto-detection so the model choice is honoured even when
///    multiple API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available
///    provider. An OpenAI key is preferred when present so users with
///    multiple keys get a predictable default.
pub fn resolve_model(config: &PipelineConfig) -> Result<Arc<dyn VisionModel>, PdfsightError> {
    let provider = resolve_provider(config)?;
    Ok(Arc::new(EdgequakeVision::new(provider)))
}

fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PdfsightError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    // 3) Honour PDFSIGHT_LLM_PROVIDER + PDFSIGHT_MODEL when both set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("PDFSIGHT_LLM_PROVIDER"),
        std::env::var("PDFSIGHT_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present, so users
    // with multiple provider keys get a predictable default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PdfsightError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PdfsightError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdfsightError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
