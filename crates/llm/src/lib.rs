//! LLM integration for the pipeline's translation, refinement, summary, and
//! report-generation operations.
//!
//! Features:
//! - Ollama backend with KV-cache session reuse for multi-turn context
//! - OpenAI-compatible backend (OpenAI, Azure, vLLM) for Keep-Alive streaming
//! - Per-operation backend selection via `factory`
//! - Streaming token generation over `tokio::sync::mpsc`

pub mod backend;
pub mod factory;
pub mod prompt;
pub mod translation;

pub use backend::{
    FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend,
    OpenAIConfig,
};
pub use factory::{LlmFactory, LlmProvider, LlmProviderConfig, OperationBackends};
pub use prompt::{
    refine_prompt, report_prompt, summarize_prompt, translate_prompt, vocabulary_prompt, Message,
    Role,
};
pub use translation::{RealtimeTranslationBackend, RefinedTranslationBackend};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Context too long: {0} > {1}")]
    ContextTooLong(usize, usize),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for voice_agent_core::Error {
    fn from(err: LlmError) -> Self {
        voice_agent_core::Error::Llm(err.to_string())
    }
}
