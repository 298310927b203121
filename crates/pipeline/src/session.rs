//! C11: Pipeline State Machine & session driver.
//!
//! Wires C1-C13 together for one session: owns the lifecycle, the shared
//! event bus, and the background tasks that carry segments from the ASR
//! adapter through coalescing, sentence/paragraph aggregation, and both
//! translation tiers. Exposes the eight command-surface operations.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use voice_agent_config::{AsrConfig, Settings};
use voice_agent_core::{AsrAdapter, EventKind, HistoryEntry, PipelineState, Tier};
use voice_agent_llm::translation::{RealtimeTranslationBackend, RefinedTranslationBackend};
use voice_agent_llm::{vocabulary_prompt, report_prompt, translate_prompt, LlmBackend, OperationBackends};

use crate::asr_adapter::DeepgramAsrAdapter;
use crate::coalescer::{Coalescer, CoalescerConfig};
use crate::display_sync::DisplaySync;
use crate::event_bus::EventBus;
use crate::history::RingBuffer;
use crate::hq_translator::{HighQualityTranslator, RefinementRequest};
use crate::paragraph_builder::{ParagraphBuilder, ParagraphBuilderConfig};
use crate::realtime_translator::RealtimeTranslator;
use crate::segment_router::{Routed, SegmentRouter, ORIGINAL_SLOT};
use crate::sentence_combiner::SentenceCombiner;
use crate::summarizer::{ProgressiveSummarizer, SummarizerConfig};

const TICK_INTERVAL_MS: u64 = 100;

/// Outcome of any command-surface call: `{ok}` or `{error, kind, message}`.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Ok,
    Error { kind: String, message: String },
}

impl CommandOutcome {
    fn state_error(message: impl Into<String>) -> Self {
        CommandOutcome::Error {
            kind: "state".to_string(),
            message: message.into(),
        }
    }
}

struct Aggregators {
    coalescer: Coalescer,
    display: DisplaySync,
    sentences: SentenceCombiner,
    paragraphs: ParagraphBuilder,
    history: RingBuffer,
    summarizer: ProgressiveSummarizer,
}

/// One lecture session: state machine plus every wired component.
pub struct PipelineSession {
    state: Mutex<PipelineState>,
    bus: Arc<EventBus>,
    asr_config: AsrConfig,
    asr: Mutex<Option<Arc<DeepgramAsrAdapter>>>,
    realtime: Arc<RealtimeTranslator>,
    hq: Arc<HighQualityTranslator>,
    llm: OperationBackends,
    aggregators: Mutex<Aggregators>,
    source_lang: Mutex<String>,
    target_lang: Mutex<String>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineSession {
    pub fn new(settings: Settings, llm: OperationBackends, corr: Uuid) -> Arc<Self> {
        let bus = Arc::new(EventBus::new(corr));

        let realtime = Arc::new(RealtimeTranslator::new(
            Arc::new(RealtimeTranslationBackend::new(llm.translate.clone())),
            bus.clone(),
        ));
        let hq = Arc::new(
            HighQualityTranslator::new(
                Arc::new(RefinedTranslationBackend::new(llm.translate.clone())),
                bus.clone(),
            )
            .with_realtime(realtime.clone()),
        );

        let aggregators = Aggregators {
            coalescer: Coalescer::new(CoalescerConfig {
                debounce_ms: settings.coalesce.debounce_ms,
                force_ms: settings.coalesce.force_ms,
                ..CoalescerConfig::default()
            }),
            display: DisplaySync::new(),
            sentences: SentenceCombiner::new(),
            paragraphs: ParagraphBuilder::new(ParagraphBuilderConfig {
                min_duration_ms: settings.paragraph.min_ms,
                max_duration_ms: settings.paragraph.max_ms,
                silence_threshold_ms: settings.paragraph.silence_ms,
            }),
            history: RingBuffer::new(),
            summarizer: ProgressiveSummarizer::new(
                SummarizerConfig {
                    interval_ms: settings.summary.interval_ms,
                    word_threshold: settings.summary.word_threshold,
                },
                llm.summary.clone(),
                llm.summary_translate.clone(),
                bus.clone(),
            ),
        };

        Arc::new(Self {
            state: Mutex::new(PipelineState::Idle),
            bus,
            asr_config: settings.asr,
            asr: Mutex::new(None),
            realtime,
            hq,
            llm,
            aggregators: Mutex::new(aggregators),
            source_lang: Mutex::new("en".to_string()),
            target_lang: Mutex::new("ja".to_string()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn subscribe(&self) -> crate::event_bus::EventSubscriber {
        self.bus.subscribe()
    }

    /// `startListening(source_lang, target_lang, correlation_id)`. The
    /// `correlation_id` is logged but the bus's own `corr` (fixed at
    /// session construction) is what's stamped on events.
    pub async fn start_listening(self: &Arc<Self>, source_lang: &str, target_lang: &str, _correlation_id: Uuid) -> CommandOutcome {
        {
            let mut state = self.state.lock().await;
            if !state.can_transition_to(PipelineState::Starting) {
                return CommandOutcome::state_error(format!("cannot start from {state:?}"));
            }
            *state = PipelineState::Starting;
        }

        *self.source_lang.lock().await = source_lang.to_string();
        *self.target_lang.lock().await = target_lang.to_string();

        let adapter = Arc::new(DeepgramAsrAdapter::connect(self.asr_config.clone(), Uuid::new_v4().to_string()));
        *self.asr.lock().await = Some(adapter.clone());

        {
            let mut state = self.state.lock().await;
            *state = PipelineState::Listening;
        }
        self.bus.publish(EventKind::Status, serde_json::json!({"state": "listening"}));

        let session = self.clone();
        let segment_task = tokio::spawn(async move {
            let mut segments = adapter.segments();
            while let Some(item) = segments.next().await {
                match item {
                    Ok(segment) => session.process_segment(segment).await,
                    Err(e) => {
                        session.bus.publish(
                            EventKind::Error,
                            serde_json::json!({"kind": "recoverable", "message": e.to_string()}),
                        );
                    }
                }
            }
        });

        let session = self.clone();
        let tick_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
            loop {
                interval.tick().await;
                session.tick().await;
            }
        });

        self.tasks.lock().await.extend([segment_task, tick_task]);
        CommandOutcome::Ok
    }

    async fn process_segment(self: &Arc<Self>, segment: voice_agent_core::AsrSegment) {
        if !self.state.lock().await.accepts_audio() {
            return;
        }

        let router = SegmentRouter::new(&self.bus);
        let source_lang = self.source_lang.lock().await.clone();
        let target_lang = self.target_lang.lock().await.clone();

        match router.route(segment) {
            Routed::Interim(segment) => {
                let mut aggregators = self.aggregators.lock().await;
                if let Some(emission) = aggregators.coalescer.update(ORIGINAL_SLOT, &segment.text, "", false) {
                    aggregators.display.apply(&emission.slot_key, &emission.text, &emission.translation);
                    let snapshot = aggregators.display.snapshot();
                    self.bus.publish(EventKind::DisplayUpdate, serde_json::json!({"pairs": snapshot}));
                }
            }
            Routed::Final(segment) => {
                self.realtime.submit(segment.id.clone(), segment.text.clone(), &source_lang, &target_lang);

                let mut aggregators = self.aggregators.lock().await;
                aggregators.history.push(HistoryEntry::new(segment.id.clone(), segment.text.clone(), String::new(), Tier::Realtime));
                aggregators.summarizer.accumulate(&segment.text, segment.end_ts);

                let sentence = aggregators.sentences.add(segment.clone());
                let sentence_texts: Vec<String> = sentence
                    .segment_ids
                    .iter()
                    .filter_map(|id| aggregators.history.get(id).map(|e| e.source.clone()))
                    .collect();
                drop(aggregators);
                self.hq.submit(
                    RefinementRequest {
                        tier: Tier::Sentence,
                        replaces: sentence.segment_ids,
                        source_text: sentence.source_text,
                        source_segments: sentence_texts,
                    },
                    &source_lang,
                    &target_lang,
                );

                let mut aggregators = self.aggregators.lock().await;
                if let Some(paragraph) = aggregators.paragraphs.add(segment) {
                    for id in &paragraph.segment_ids {
                        aggregators.history.attach_paragraph(id, paragraph.id.clone());
                    }
                    let paragraph_texts: Vec<String> = paragraph
                        .segment_ids
                        .iter()
                        .filter_map(|id| aggregators.history.get(id).map(|e| e.source.clone()))
                        .collect();
                    drop(aggregators);
                    self.hq.submit(
                        RefinementRequest {
                            tier: Tier::Paragraph,
                            replaces: paragraph.segment_ids,
                            source_text: paragraph.raw_text,
                            source_segments: paragraph_texts,
                        },
                        &source_lang,
                        &target_lang,
                    );
                }
            }
        }
    }

    async fn tick(self: &Arc<Self>) {
        let source_lang = self.source_lang.lock().await.clone();
        let target_lang = self.target_lang.lock().await.clone();

        let mut aggregators = self.aggregators.lock().await;
        for emission in aggregators.coalescer.tick() {
            aggregators.display.apply(&emission.slot_key, &emission.text, &emission.translation);
            let snapshot = aggregators.display.snapshot();
            self.bus.publish(EventKind::DisplayUpdate, serde_json::json!({"pairs": snapshot}));
        }
        aggregators.coalescer.garbage_collect();

        if let Some(sentence) = aggregators.sentences.tick() {
            let texts: Vec<String> = sentence
                .segment_ids
                .iter()
                .filter_map(|id| aggregators.history.get(id).map(|e| e.source.clone()))
                .collect();
            drop(aggregators);
            self.hq.submit(
                RefinementRequest {
                    tier: Tier::Sentence,
                    replaces: sentence.segment_ids,
                    source_text: sentence.source_text,
                    source_segments: texts,
                },
                &source_lang,
                &target_lang,
            );
            aggregators = self.aggregators.lock().await;
        }

        let should_summarize = aggregators.summarizer.word_threshold_crossed();
        if should_summarize {
            drop(aggregators);
            self.aggregators.lock().await.summarizer.emit(&source_lang, &target_lang, 0.0).await;
        }
    }

    /// `stopListening(correlation_id)`: cancels in-flight jobs by dropping
    /// their subscriptions is implicit (jobs are fire-and-forget tasks);
    /// closes the ASR socket with its drain window, flushes C7/C8, then
    /// transitions to `Idle`.
    pub async fn stop_listening(self: &Arc<Self>, _correlation_id: Uuid) -> CommandOutcome {
        {
            let mut state = self.state.lock().await;
            if !state.can_transition_to(PipelineState::Stopping) {
                return CommandOutcome::state_error(format!("cannot stop from {state:?}"));
            }
            *state = PipelineState::Stopping;
        }

        if let Some(adapter) = self.asr.lock().await.take() {
            let _ = adapter.close().await;
        }

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        {
            let mut aggregators = self.aggregators.lock().await;
            if let Some(sentence) = aggregators.sentences.flush() {
                self.bus.publish(EventKind::Final, serde_json::json!({"flushed_sentence": sentence.id}));
            }
            if let Some(paragraph) = aggregators.paragraphs.flush() {
                self.bus.publish(EventKind::Final, serde_json::json!({"flushed_paragraph": paragraph.id}));
            }
        }

        *self.state.lock().await = PipelineState::Idle;
        self.bus.publish(EventKind::Status, serde_json::json!({"state": "idle"}));
        CommandOutcome::Ok
    }

    /// `pause()`: stops accepting audio; in-flight jobs are left to finish.
    pub async fn pause(&self) -> CommandOutcome {
        let mut state = self.state.lock().await;
        if !state.can_transition_to(PipelineState::Paused) {
            return CommandOutcome::state_error(format!("cannot pause from {state:?}"));
        }
        *state = PipelineState::Paused;
        CommandOutcome::Ok
    }

    pub async fn resume(&self) -> CommandOutcome {
        let mut state = self.state.lock().await;
        if !state.can_transition_to(PipelineState::Listening) {
            return CommandOutcome::state_error(format!("cannot resume from {state:?}"));
        }
        *state = PipelineState::Listening;
        CommandOutcome::Ok
    }

    pub async fn clear_history(&self) -> CommandOutcome {
        self.aggregators.lock().await.history.clear();
        CommandOutcome::Ok
    }

    pub async fn generate_vocabulary(&self, source_lang: &str) -> Result<String, CommandOutcome> {
        self.run_accumulated_op(&self.llm.vocabulary, |text, lang| vocabulary_prompt(text, lang), source_lang).await
    }

    pub async fn generate_final_report(&self, source_lang: &str) -> Result<String, CommandOutcome> {
        self.run_accumulated_op(&self.llm.report, |text, lang| report_prompt(text, lang), source_lang).await
    }

    async fn run_accumulated_op(
        &self,
        backend: &Arc<dyn LlmBackend>,
        build_prompt: impl Fn(&str, &str) -> Vec<voice_agent_llm::Message>,
        source_lang: &str,
    ) -> Result<String, CommandOutcome> {
        let accumulated = {
            let aggregators = self.aggregators.lock().await;
            aggregators
                .history
                .iter()
                .map(|e| e.source.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };
        let messages = build_prompt(&accumulated, source_lang);
        backend.generate(&messages).await.map(|r| r.text).map_err(|e| CommandOutcome::Error {
            kind: "provider".to_string(),
            message: e.to_string(),
        })
    }

    /// `translateUserInput(text, from, to)`: a one-off request outside the
    /// realtime/high-quality tiers, served directly by the `user_translate`
    /// backend.
    pub async fn translate_user_input(&self, text: &str, from: &str, to: &str) -> Result<String, CommandOutcome> {
        let messages = translate_prompt(text, from, to);
        let result = self.llm.user_translate.generate(&messages).await.map_err(|e| CommandOutcome::Error {
            kind: "provider".to_string(),
            message: e.to_string(),
        })?;
        self.bus.publish(
            EventKind::TranslationComplete,
            serde_json::json!({"kind": "user_input", "text": result.text}),
        );
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_cannot_stop() {
        let settings = Settings::default();
        let llm = stub_operation_backends();
        let session = PipelineSession::new(settings, llm, Uuid::new_v4());
        let outcome = session.stop_listening(Uuid::new_v4()).await;
        assert!(matches!(outcome, CommandOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn pause_requires_listening_state() {
        let settings = Settings::default();
        let llm = stub_operation_backends();
        let session = PipelineSession::new(settings, llm, Uuid::new_v4());
        let outcome = session.pause().await;
        assert!(matches!(outcome, CommandOutcome::Error { .. }));
    }

    fn stub_operation_backends() -> OperationBackends {
        use async_trait::async_trait;
        use voice_agent_llm::{FinishReason, GenerationResult, LlmError, Message};

        struct Stub;
        #[async_trait]
        impl LlmBackend for Stub {
            async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
                Ok(GenerationResult {
                    text: String::new(),
                    tokens: 0,
                    time_to_first_token_ms: 0,
                    total_time_ms: 0,
                    tokens_per_second: 0.0,
                    finish_reason: FinishReason::Stop,
                    context: None,
                })
            }
            async fn generate_stream(&self, messages: &[Message], _tx: tokio::sync::mpsc::Sender<String>) -> Result<GenerationResult, LlmError> {
                self.generate(messages).await
            }
        }

        OperationBackends {
            translate: Arc::new(Stub),
            summary: Arc::new(Stub),
            summary_translate: Arc::new(Stub),
            user_translate: Arc::new(Stub),
            vocabulary: Arc::new(Stub),
            report: Arc::new(Stub),
        }
    }
}
