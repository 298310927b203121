//! C10: Progressive Summarizer.
//!
//! Accumulates final source text and periodically (timer or word-count
//! threshold, whichever fires first) asks the `summary` operation backend
//! for a 2-3 sentence summary, then routes that summary through a
//! `SummaryTranslate`-tier request on the `summary_translate` backend.
//! One retry on failure, then the round is skipped and logged.

use std::sync::Arc;

use voice_agent_core::{EventKind, Summary};
use voice_agent_llm::{Message, LlmBackend, LlmError};

use crate::event_bus::EventBus;

const DEFAULT_INTERVAL_MS: u64 = 120_000;
const DEFAULT_WORD_THRESHOLD: usize = 400;
const RETRY_DELAY_MS: u64 = 500;

pub struct SummarizerConfig {
    pub interval_ms: u64,
    pub word_threshold: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            word_threshold: DEFAULT_WORD_THRESHOLD,
        }
    }
}

pub struct ProgressiveSummarizer {
    config: SummarizerConfig,
    summary_backend: Arc<dyn LlmBackend>,
    translate_backend: Arc<dyn LlmBackend>,
    bus: Arc<EventBus>,
    buffer: String,
    covers_start_ts: f64,
    last_emit_words: usize,
    next_id: u64,
}

impl ProgressiveSummarizer {
    pub fn new(
        config: SummarizerConfig,
        summary_backend: Arc<dyn LlmBackend>,
        translate_backend: Arc<dyn LlmBackend>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            summary_backend,
            translate_backend,
            bus,
            buffer: String::new(),
            covers_start_ts: 0.0,
            last_emit_words: 0,
            next_id: 0,
        }
    }

    pub fn accumulate(&mut self, source_text: &str, end_ts: f64) {
        if self.buffer.is_empty() {
            self.covers_start_ts = end_ts;
        }
        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(source_text);
    }

    /// Whether accumulated word count has crossed the threshold since the
    /// last emitted summary; the session driver also calls this on a timer
    /// tick regardless of word count.
    pub fn word_threshold_crossed(&self) -> bool {
        let words = self.buffer.split_whitespace().count();
        words.saturating_sub(self.last_emit_words) >= self.config.word_threshold
    }

    pub fn interval_ms(&self) -> u64 {
        self.config.interval_ms
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    /// Produce and publish a `Summary` event for the text accumulated so
    /// far. On backend failure, retries once after a short delay; if that
    /// also fails, the round is skipped (buffer is preserved for the next
    /// attempt) and an `error{recoverable}` event is published.
    pub async fn emit(&mut self, source_lang: &str, target_lang: &str, end_ts: f64) -> Option<Summary> {
        if self.is_empty() {
            return None;
        }

        let accumulated = self.buffer.clone();
        let summary_text = match self.summarize_with_retry(&accumulated, source_lang).await {
            Ok(text) => text,
            Err(e) => {
                self.bus.publish(
                    EventKind::Error,
                    serde_json::json!({"kind": "recoverable", "stage": "summary", "message": e.to_string()}),
                );
                return None;
            }
        };

        let translated_text = match self.translate_with_retry(&summary_text, source_lang, target_lang).await {
            Ok(text) => text,
            Err(e) => {
                self.bus.publish(
                    EventKind::Error,
                    serde_json::json!({"kind": "recoverable", "stage": "summary_translate", "message": e.to_string()}),
                );
                return None;
            }
        };

        let id = format!("summary-{}", self.next_id);
        self.next_id += 1;
        let word_count = summary_text.split_whitespace().count();

        let summary = Summary {
            id,
            source_text: summary_text,
            translated_text,
            covers_start_ts: self.covers_start_ts,
            covers_end_ts: end_ts,
            word_count,
        };

        self.bus.publish(
            EventKind::Summary,
            serde_json::json!({
                "id": summary.id,
                "source_text": summary.source_text,
                "translated_text": summary.translated_text,
                "covers_start_ts": summary.covers_start_ts,
                "covers_end_ts": summary.covers_end_ts,
            }),
        );

        // Drained so the next window covers only text accumulated since this
        // emit; `accumulate` resets `covers_start_ts` once the buffer is empty.
        self.buffer.clear();
        self.last_emit_words = 0;

        Some(summary)
    }

    async fn summarize_with_retry(&self, text: &str, source_lang: &str) -> Result<String, LlmError> {
        let messages = summarize_prompt(text, source_lang);
        match self.summary_backend.generate(&messages).await {
            Ok(result) => Ok(result.text),
            Err(_) => {
                tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                self.summary_backend.generate(&messages).await.map(|r| r.text)
            }
        }
    }

    async fn translate_with_retry(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String, LlmError> {
        let messages = voice_agent_llm::translate_prompt(text, source_lang, target_lang);
        match self.translate_backend.generate(&messages).await {
            Ok(result) => Ok(result.text),
            Err(_) => {
                tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                self.translate_backend.generate(&messages).await.map(|r| r.text)
            }
        }
    }
}

fn summarize_prompt(text: &str, source_lang: &str) -> Vec<Message> {
    voice_agent_llm::summarize_prompt(text, source_lang)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use uuid::Uuid;
    use voice_agent_llm::GenerationResult;

    struct StubBackend {
        reply: &'static str,
    }

    #[async_trait]
    impl LlmBackend for StubBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
            Ok(GenerationResult {
                text: self.reply.to_string(),
                tokens: 1,
                time_to_first_token_ms: 0,
                total_time_ms: 0,
                tokens_per_second: 0.0,
                finish_reason: voice_agent_llm::FinishReason::Stop,
                context: None,
            })
        }

        async fn generate_stream(
            &self,
            _messages: &[Message],
            _tx: tokio::sync::mpsc::Sender<String>,
        ) -> Result<GenerationResult, LlmError> {
            self.generate(_messages).await
        }
    }

    #[tokio::test]
    async fn accumulation_then_emit_clears_threshold_and_publishes() {
        let bus = Arc::new(EventBus::new(Uuid::new_v4()));
        let mut sub = bus.subscribe();
        let mut summarizer = ProgressiveSummarizer::new(
            SummarizerConfig::default(),
            Arc::new(StubBackend { reply: "A short summary." }),
            Arc::new(StubBackend { reply: "要約。" }),
            bus,
        );

        summarizer.accumulate("Lecture content about topic A.", 10.0);
        let summary = summarizer.emit("en", "ja", 10.0).await.unwrap();
        assert_eq!(summary.translated_text, "要約。");

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Summary);
    }

    #[test]
    fn empty_buffer_never_crosses_threshold() {
        let bus = Arc::new(EventBus::new(Uuid::new_v4()));
        let summarizer = ProgressiveSummarizer::new(
            SummarizerConfig::default(),
            Arc::new(StubBackend { reply: "" }),
            Arc::new(StubBackend { reply: "" }),
            bus,
        );
        assert!(!summarizer.word_threshold_crossed());
    }
}
