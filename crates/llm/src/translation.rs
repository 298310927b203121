//! Adapts `LlmBackend` to `voice_agent_core::TranslationBackend`, the trait
//! C4 (realtime) and C9 (high-quality) depend on so the pipeline crate never
//! needs to know about prompt shapes or concrete LLM wire formats.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use voice_agent_core::{Error, Result, TranslateRequest, TranslateResult, TranslationBackend};

use crate::backend::LlmBackend;
use crate::prompt::{refine_prompt, translate_prompt};

/// C4's draft translator: minimal prompt, no context-awareness.
pub struct RealtimeTranslationBackend {
    backend: Arc<dyn LlmBackend>,
}

impl RealtimeTranslationBackend {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TranslationBackend for RealtimeTranslationBackend {
    async fn translate_stream(
        &self,
        request: TranslateRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<TranslateResult> {
        let messages = translate_prompt(&request.source_text, &request.source_lang, &request.target_lang);
        let result = self
            .backend
            .generate_stream(&messages, tx)
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(TranslateResult {
            text: result.text,
            tentative: false,
        })
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// C9's high-quality translator: context-aware, term-preserving prompt.
pub struct RefinedTranslationBackend {
    backend: Arc<dyn LlmBackend>,
}

impl RefinedTranslationBackend {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TranslationBackend for RefinedTranslationBackend {
    async fn translate_stream(
        &self,
        request: TranslateRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<TranslateResult> {
        let messages = refine_prompt(&request.source_text, &request.source_lang, &request.target_lang);
        let result = self
            .backend
            .generate_stream(&messages, tx)
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        Ok(TranslateResult {
            text: result.text,
            tentative: false,
        })
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
