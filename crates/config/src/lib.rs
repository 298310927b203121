//! Configuration management for the UniVoice pipeline.
//!
//! Supports loading configuration from:
//! - YAML files under `config/`
//! - Environment variables (`UNIVOICE__` prefix)
//! - Runtime overrides
//!
//! Configuration *loading as an external collaborator* is out of this
//! core's scope per the outer shell's responsibilities, but the shape of
//! `Settings` and its defaults live here so every crate sees the same
//! recognized keys (`asr.*`, `audio.*`, `llm.*`, `coalesce.*`,
//! `paragraph.*`, `summary.*`).

pub mod constants;
pub mod settings;

pub use settings::{
    AsrConfig, AudioConfig, CoalesceConfig, LlmModelsConfig, ObservabilityConfig,
    ParagraphConfig, RuntimeEnvironment, Settings, SummaryConfig, load_settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
