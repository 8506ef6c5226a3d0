//! Extraction client: send one statement's page images to a vision model
//! and return its raw text answer.
//!
//! One document is one request. All page images go into a single user
//! message, in page order, behind the extraction contract as the system
//! message, so the model sees the whole statement at once: running
//! balances, carried-over rows, and the debit/credit convention printed on
//! page one all stay in context. The prompt itself lives in
//! [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Transient 429 / 503 answers are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`): with 500 ms base and 2 retries the wait
//! sequence is 500 ms → 1 s. Each attempt is bounded by `api_timeout_secs`.

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::{FileError, FintracksError};
use crate::pipeline::encode::EncodedImage;
use crate::prompts::EXTRACTION_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Text accompanying the page images in the user turn.
const USER_INSTRUCTION: &str =
    "The following images are the pages of one statement, in order. Extract every transaction.";

/// Sends one document's images to the extraction service.
pub trait Extractor: Send + Sync {
    /// Return the service's raw text answer for the statement `name`.
    ///
    /// `images` must not be empty; callers skip image-less files before
    /// reaching this point.
    fn extract<'a>(
        &'a self,
        name: &'a str,
        images: &'a [EncodedImage],
    ) -> BoxFuture<'a, Result<String, FileError>>;
}

/// Production extractor backed by an `edgequake-llm` vision provider.
pub struct VisionExtractor {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl VisionExtractor {
    /// Wrap an already-resolved provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| EXTRACTION_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and the environment.
    ///
    /// Fails with [`FintracksError::ProviderNotConfigured`] when no
    /// credential is available; this is fatal and never retried.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, FintracksError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn extract_document(&self, name: &str, images: &[EncodedImage]) -> Result<String, FileError> {
        if images.is_empty() {
            return Err(FileError::ServiceFailed {
                name: name.to_string(),
                retries: 0,
                detail: "no page images to send".to_string(),
            });
        }

        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(
                USER_INSTRUCTION,
                images.iter().map(EncodedImage::to_image_data).collect(),
            ),
        ];

        let mut last_err: Option<String> = None;
        let mut timed_out = false;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&self.options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} images, {} input tokens, {} output tokens, {:?}",
                        name,
                        images.len(),
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("{}: attempt {} failed: {}", name, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                    timed_out = false;
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        name,
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = Some(format!("timed out after {}s", self.api_timeout_secs));
                    timed_out = true;
                }
            }
        }

        if timed_out {
            return Err(FileError::Timeout {
                name: name.to_string(),
                secs: self.api_timeout_secs,
            });
        }

        Err(FileError::ServiceFailed {
            name: name.to_string(),
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

impl Extractor for VisionExtractor {
    fn extract<'a>(
        &'a self,
        name: &'a str,
        images: &'a [EncodedImage],
    ) -> BoxFuture<'a, Result<String, FileError>> {
        Box::pin(self.extract_document(name, images))
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider** (`config.provider_name`): the factory reads the
///    matching API key (`GEMINI_API_KEY`, `OPENAI_API_KEY`, …).
/// 3. **Environment pair** (`FINTRACKS_LLM_PROVIDER` + `FINTRACKS_MODEL`).
/// 4. **Gemini key present**: the default vision provider.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, FintracksError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("FINTRACKS_LLM_PROVIDER"),
        std::env::var("FINTRACKS_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FintracksError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No extraction provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    info!("Auto-detected extraction provider");
    Ok(llm_provider)
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, FintracksError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FintracksError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::encode_raw;
    use edgequake_llm::{ChatRole, LLMResponse, LlmError};
    use std::sync::Mutex;

    /// Role and attached image payloads of one message, as the provider saw it.
    type SeenMessage = (ChatRole, String, Vec<String>);

    /// Fails its first `failures` calls, or stalls on every call, then
    /// answers with `reply`. Every request is recorded.
    #[derive(Default)]
    struct ScriptedProvider {
        failures: usize,
        stall: bool,
        reply: String,
        requests: Mutex<Vec<Vec<SeenMessage>>>,
    }

    impl ScriptedProvider {
        fn requests(&self) -> Vec<Vec<SeenMessage>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-vision"
        }

        fn max_context_length(&self) -> usize {
            128_000
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            Ok(LLMResponse::new(self.reply.clone(), "scripted-vision"))
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete(prompt).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            let seen: Vec<SeenMessage> = messages
                .iter()
                .map(|m| {
                    let images = m
                        .images
                        .as_ref()
                        .map(|imgs| imgs.iter().map(|i| i.data.clone()).collect())
                        .unwrap_or_default();
                    (m.role, m.content.clone(), images)
                })
                .collect();
            let call = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(seen);
                requests.len()
            };

            if self.stall {
                sleep(Duration::from_secs(3600)).await;
            }
            if call <= self.failures {
                return Err(LlmError::RateLimited("429 Too Many Requests".into()));
            }
            self.complete("").await
        }
    }

    fn extractor(provider: Arc<ScriptedProvider>, max_retries: u32) -> VisionExtractor {
        let config = ExtractionConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(10)
            .api_timeout_secs(5)
            .build()
            .unwrap();
        VisionExtractor::new(provider, &config)
    }

    fn pages(n: usize) -> Vec<EncodedImage> {
        (1..=n)
            .map(|i| encode_raw(format!("page-{i}").as_bytes(), "image/jpeg"))
            .collect()
    }

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_delay(500, 1), 500);
        assert_eq!(backoff_delay(500, 2), 1000);
        assert_eq!(backoff_delay(500, 3), 2000);
        assert_eq!(backoff_delay(0, 5), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn whole_statement_is_one_system_and_one_user_message() {
        let provider = Arc::new(ScriptedProvider {
            reply: "Date,Description,Amount\n2024-01-01,Tea,-2".into(),
            ..Default::default()
        });
        let images = pages(3);

        let text = extractor(provider.clone(), 2)
            .extract("march.pdf", &images)
            .await
            .unwrap();

        assert!(text.starts_with("Date,Description,Amount"));
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);

        let messages = &requests[0];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, ChatRole::System);
        assert_eq!(messages[0].1, EXTRACTION_PROMPT);
        assert!(messages[0].2.is_empty());
        assert_eq!(messages[1].0, ChatRole::User);
        let sent: Vec<String> = images.iter().map(|i| i.data.clone()).collect();
        assert_eq!(messages[1].2, sent);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let provider = Arc::new(ScriptedProvider {
            failures: 2,
            reply: "ok".into(),
            ..Default::default()
        });

        let text = extractor(provider.clone(), 2)
            .extract("card.png", &pages(1))
            .await
            .unwrap();

        assert_eq!(text, "ok");
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_a_service_failure() {
        let provider = Arc::new(ScriptedProvider {
            failures: usize::MAX,
            ..Default::default()
        });

        let err = extractor(provider.clone(), 2)
            .extract("card.png", &pages(1))
            .await
            .unwrap_err();

        match err {
            FileError::ServiceFailed { name, retries, detail } => {
                assert_eq!(name, "card.png");
                assert_eq!(retries, 2);
                assert!(detail.contains("429"), "got: {detail}");
            }
            other => panic!("expected ServiceFailed, got {other:?}"),
        }
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn final_timeout_is_reported_as_timeout() {
        let provider = Arc::new(ScriptedProvider {
            stall: true,
            ..Default::default()
        });

        let err = extractor(provider.clone(), 1)
            .extract("slow.pdf", &pages(2))
            .await
            .unwrap_err();

        assert!(matches!(err, FileError::Timeout { ref name, secs: 5 } if name == "slow.pdf"));
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_image_list_sends_nothing() {
        let provider = Arc::new(ScriptedProvider::default());

        let err = extractor(provider.clone(), 2)
            .extract("blank.pdf", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, FileError::ServiceFailed { retries: 0, .. }));
        assert!(provider.requests().is_empty());
    }
}
