// src/providers/openai.rs

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::OpenAIConfig;
use crate::errors::{EvalError, Result};
use crate::providers::Generator;

/// Steers the model towards self-contained, fenced Python.
const SYSTEM_PROMPT: &str = "You are an expert Python programmer. Your task is to write complete, self-contained function code.
Follow these rules strictly:
1. Output complete code: every required import, the function definition (def), its docstring and the full body.
2. Restate the function signature even when it is already given; never output only the body.
3. Indent with 4 spaces.
4. Wrap the code between ```python and ```.
5. Do not output explanations, comments or test cases, only the code itself.";

/// A provider for any OpenAI-compatible chat completions endpoint.
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider`.
    pub fn new(client: Client, config: OpenAIConfig, request_timeout: Duration) -> Self {
        Self { client, config, request_timeout }
    }
}

impl Generator for OpenAIProvider {
    /// Calls the chat completions API and returns the reply text.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        log::debug!("Calling OpenAI-compatible API: {} with model: {}", url, self.config.model);

        let body = OpenAIRequest {
            model: &self.config.model,
            messages: vec![
                Message { role: "system", content: SYSTEM_PROMPT },
                Message { role: "user", content: prompt },
            ],
            temperature: 0.2,
            max_tokens: 512,
        };

        let start = Instant::now();

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        log::debug!("OpenAI-compatible response status: {} ({}ms)", status, latency_ms);

        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            return Err(EvalError::ApiError {
                status: status.as_u16(),
                body: error_body,
            });
        }

        let openai_resp: OpenAIResponse = resp.json().await?;

        let output = openai_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::UnexpectedResponse("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if output.is_empty() {
            return Err(EvalError::EmptyResponse);
        }

        Ok(output)
    }
}
