// src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Unexpected response structure: {0}")]
    UnexpectedResponse(String),

    #[error("Received empty text response from model")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    #[error("Problem file line {line} is not a valid problem: {source}")]
    ProblemParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Result log line {line} is not a valid record: {source}")]
    LogParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot write result log '{}': {source}", path.display())]
    ResultLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unrecognised status string: {0:?}")]
    InvalidStatus(String),

    #[error("Failed to start interpreter: {0}")]
    SandboxSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
