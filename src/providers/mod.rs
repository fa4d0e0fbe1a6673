// src/providers/mod.rs

use std::time::Duration;

use crate::config::{AppConfig, GenerationConfig, parse_model_string};
use crate::errors::{EvalError, Result};
use crate::problems::Problem;

pub mod canonical;
pub mod ollama;
pub mod openai;

use canonical::CanonicalProvider;
use ollama::OllamaProvider;
use openai::OpenAIProvider;

/// A common trait for anything that turns a problem prompt into a completion.
///
/// Note: We're not using async_trait here, so implementers must handle async directly.
pub trait Generator: Send + Sync {
    /// Produces the model's raw reply for `prompt`.
    fn generate(&self, prompt: &str) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Retries a generator a fixed number of times with a constant pause.
///
/// Never fails: once every attempt is used up it yields an empty completion,
/// which the evaluation job records as `API_Error`.
pub struct RetryingGenerator<G> {
    inner: G,
    attempts: u32,
    backoff: Duration,
}

impl<G> RetryingGenerator<G> {
    pub fn new(inner: G, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(inner: G, config: &GenerationConfig) -> Self {
        Self::new(inner, config.attempts, Duration::from_millis(config.backoff_ms))
    }
}

impl<G: Generator> Generator for RetryingGenerator<G> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        for attempt in 1..=self.attempts {
            match self.inner.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log::warn!("Generation failed (attempt {}/{}): {}", attempt, self.attempts, e);
                    if attempt < self.attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }
        log::error!("Giving up on this problem after {} attempts", self.attempts);
        Ok(String::new())
    }
}

/// The concrete generators selectable from the command line.
pub enum Provider {
    OpenAI(OpenAIProvider),
    Ollama(OllamaProvider),
    Canonical(CanonicalProvider),
}

impl Generator for Provider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            Provider::OpenAI(p) => p.generate(prompt).await,
            Provider::Ollama(p) => p.generate(prompt).await,
            Provider::Canonical(p) => p.generate(prompt).await,
        }
    }
}

/// Builds the provider named by a `provider:model` string.
pub fn build_provider(
    config: &AppConfig,
    model_str: &str,
    client: &reqwest::Client,
    generation: &GenerationConfig,
    problems: &[Problem],
) -> Result<Provider> {
    let (provider_name, model_name) = parse_model_string(model_str);
    let request_timeout = Duration::from_secs(generation.request_timeout_secs);

    match provider_name.as_str() {
        "openai" => {
            let mut openai_config = config.openai.clone()
                .ok_or_else(|| EvalError::ProviderNotFound("openai".to_string()))?;
            if !model_name.is_empty() {
                openai_config.model = model_name;
            }
            Ok(Provider::OpenAI(OpenAIProvider::new(client.clone(), openai_config, request_timeout)))
        }
        "ollama" => {
            let mut ollama_config = config.ollama.clone()
                .ok_or_else(|| EvalError::ProviderNotFound("ollama".to_string()))?;
            if !model_name.is_empty() {
                ollama_config.model = model_name;
            }
            Ok(Provider::Ollama(OllamaProvider::new(client.clone(), ollama_config, request_timeout)))
        }
        "canonical" => Ok(Provider::Canonical(CanonicalProvider::from_problems(problems))),
        _ => Err(EvalError::ProviderNotFound(provider_name)),
    }
}
