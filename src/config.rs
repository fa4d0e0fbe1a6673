// src/config.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{EvalError, Result};

/// Imports HumanEval candidates commonly assume without writing them.
pub const DEFAULT_HEADER: &str = "from typing import *\nimport math\nimport hashlib\n\n";

/// Configuration for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

/// Configuration for the Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub api_base: String,
    pub model: String,
}

/// Provider credentials loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub openai: Option<OpenAIConfig>,
    pub ollama: Option<OllamaConfig>,
}

impl AppConfig {
    /// Load provider configuration from environment variables.
    ///
    /// Nothing here is mandatory: the `canonical` generator needs no provider,
    /// so a missing provider is only reported once something asks for it.
    pub fn from_env() -> Self {
        let openai = std::env::var("OPENAI_API_KEY").ok().map(|api_key| OpenAIConfig {
            api_base: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.siliconflow.cn/v1".to_string()),
            api_key,
            model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "Pro/deepseek-ai/DeepSeek-V3".to_string()),
        });

        let ollama = std::env::var("OLLAMA_API_BASE").ok().map(|api_base| OllamaConfig {
            api_base,
            model: std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3".to_string()),
        });

        AppConfig { openai, ollama }
    }
}

/// Retry and timeout policy for the generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Total attempts per prompt, including the first.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub backoff_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff_ms: 1000,
            request_timeout_secs: 90,
        }
    }
}

/// Settings for one benchmark run. Every field has a default, so a TOML file
/// only needs the keys it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Jobs in flight at once.
    pub workers: usize,
    /// Wall-clock budget for one sandboxed run.
    pub timeout_secs: u64,
    /// JSONL result log, truncated at the start of each run.
    pub output: PathBuf,
    /// Interpreter used by the sandbox.
    pub python: String,
    /// Text prepended to every candidate program.
    pub header: String,
    /// Only evaluate the first N problems.
    pub limit: Option<usize>,
    pub generation: GenerationConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            timeout_secs: 30,
            output: PathBuf::from("results/humaneval_results.jsonl"),
            python: "python3".to_string(),
            header: DEFAULT_HEADER.to_string(),
            limit: None,
            generation: GenerationConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(EvalError::Config("workers must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(EvalError::Config("timeout_secs must be at least 1".to_string()));
        }
        if self.generation.attempts == 0 {
            return Err(EvalError::Config("generation.attempts must be at least 1".to_string()));
        }
        if self.python.trim().is_empty() {
            return Err(EvalError::Config("python must name an interpreter".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parses a model string like "provider:model_name" and returns the provider and model.
/// Defaults to "openai" if no provider is specified. A bare provider name
/// leaves the model empty so the environment's choice is kept.
pub fn parse_model_string(model_str: &str) -> (String, String) {
    match model_str.split_once(':') {
        Some((provider, model)) => (provider.to_string(), model.to_string()),
        None if matches!(model_str, "openai" | "ollama" | "canonical") => {
            (model_str.to_string(), String::new())
        }
        None => ("openai".to_string(), model_str.to_string()),
    }
}
