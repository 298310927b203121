//! LLM Factory - Provider Abstraction Layer
//!
//! Creates `LlmBackend` instances based on configuration, and wires up the
//! per-operation model selection recognized in `voice_agent_config::LlmModelsConfig`
//! (`translate`, `summary`, `summary_translate`, `user_translate`, `vocabulary`, `report`).
//!
//! ## Supported Providers
//! - **Ollama**: local models, the default for development
//! - **OpenAI-compatible**: any HTTPS streaming completion endpoint (OpenAI, Azure, vLLM)

use std::sync::Arc;

use voice_agent_config::LlmModelsConfig;

use crate::backend::{LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend, OpenAIConfig};
use crate::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAiCompatible,
}

impl Default for LlmProvider {
    fn default() -> Self {
        LlmProvider::Ollama
    }
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" | "local" => Some(LlmProvider::Ollama),
            "openai" | "gpt" | "azure" | "vllm" => Some(LlmProvider::OpenAiCompatible),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub max_idle_connections: usize,
}

pub struct LlmFactory;

impl LlmFactory {
    pub fn create(config: &LlmProviderConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
        match config.provider {
            LlmProvider::Ollama => {
                let backend = OllamaBackend::new(LlmConfig {
                    model: config.model.clone(),
                    endpoint: config.endpoint.clone(),
                    api_key: config.api_key.clone(),
                    max_tokens: config.max_tokens,
                    max_idle_connections: config.max_idle_connections,
                    ..LlmConfig::default()
                })?;
                Ok(Arc::new(backend))
            }
            LlmProvider::OpenAiCompatible => {
                let backend = OpenAIBackend::new(OpenAIConfig {
                    endpoint: config.endpoint.clone(),
                    api_key: config.api_key.clone().unwrap_or_default(),
                    model: config.model.clone(),
                    max_tokens: config.max_tokens,
                    ..OpenAIConfig::default()
                })?;
                Ok(Arc::new(backend))
            }
        }
    }

    /// Build the set of backends the pipeline needs, one per operation,
    /// from the recognized configuration keys in `llm.model_*`.
    pub fn create_operation_set(
        provider: LlmProvider,
        endpoint: &str,
        api_key: Option<String>,
        models: &LlmModelsConfig,
    ) -> Result<OperationBackends, LlmError> {
        let make = |model: &str, max_tokens: u32| {
            LlmFactory::create(&LlmProviderConfig {
                provider,
                api_key: api_key.clone(),
                endpoint: endpoint.to_string(),
                model: model.to_string(),
                max_tokens: max_tokens as usize,
                temperature: 0.3,
                max_idle_connections: models.connection_pool_size,
            })
        };

        Ok(OperationBackends {
            translate: make(&models.model_translate, models.max_tokens_translate)?,
            summary: make(&models.model_summary, models.max_tokens_summary)?,
            summary_translate: make(&models.model_summary_translate, models.max_tokens_translate)?,
            user_translate: make(&models.model_user_translate, models.max_tokens_translate)?,
            vocabulary: make(&models.model_vocabulary, models.max_tokens_vocabulary)?,
            report: make(&models.model_report, models.max_tokens_report)?,
        })
    }
}

/// One backend per command-surface/pipeline operation. C9's high-quality
/// refinement reuses `translate` with a larger-model `LlmModelsConfig.model_translate`
/// chosen by the caller; the pipeline distinguishes tiers by prompt and
/// concurrency limit, not by a separate backend slot.
#[derive(Clone)]
pub struct OperationBackends {
    pub translate: Arc<dyn LlmBackend>,
    pub summary: Arc<dyn LlmBackend>,
    pub summary_translate: Arc<dyn LlmBackend>,
    pub user_translate: Arc<dyn LlmBackend>,
    pub vocabulary: Arc<dyn LlmBackend>,
    pub report: Arc<dyn LlmBackend>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_known_aliases() {
        assert_eq!(LlmProvider::from_str("ollama"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::from_str("azure"), Some(LlmProvider::OpenAiCompatible));
        assert_eq!(LlmProvider::from_str("nonsense"), None);
    }
}
