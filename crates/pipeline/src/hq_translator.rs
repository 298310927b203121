//! C9: High-Quality Translator.
//!
//! Subscribes to Sentence and Paragraph completions and refines them with a
//! larger/slower model than C4. At most 2 concurrent jobs, queue capacity
//! 64. Publishes `translation_update{tier, replaces}`; consumers accept the
//! replacement only if its tier is >= the tier currently stored (enforced
//! by `Tier::supersedes`, not here — this component only tags the event).

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use voice_agent_core::{EventKind, Fingerprint, TranslateRequest, Tier, TranslationBackend};

use crate::event_bus::EventBus;
use crate::realtime_translator::RealtimeTranslator;

const QUEUE_CAPACITY: usize = 64;
const MAX_CONCURRENT: usize = 2;

pub struct RefinementRequest {
    pub tier: Tier,
    pub replaces: Vec<String>,
    pub source_text: String,
    /// Per-segment source text, used only to recompute the Realtime-tier
    /// fingerprints that should be marked superseded once this refinement
    /// is underway. Empty if there's nothing to supersede.
    pub source_segments: Vec<String>,
}

pub struct HighQualityTranslator {
    backend: Arc<dyn TranslationBackend>,
    bus: Arc<EventBus>,
    semaphore: Arc<Semaphore>,
    queue_len: Arc<Mutex<VecDeque<()>>>,
    realtime: Option<Arc<RealtimeTranslator>>,
}

impl HighQualityTranslator {
    pub fn new(backend: Arc<dyn TranslationBackend>, bus: Arc<EventBus>) -> Self {
        Self {
            backend,
            bus,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT)),
            queue_len: Arc::new(Mutex::new(VecDeque::new())),
            realtime: None,
        }
    }

    /// Attach the realtime translator whose drafts this refinement pass
    /// supersedes (§4.9: consumers accept replacements only at >= tier).
    pub fn with_realtime(mut self, realtime: Arc<RealtimeTranslator>) -> Self {
        self.realtime = Some(realtime);
        self
    }

    /// Submit a Sentence or Paragraph for refinement. Drops the request
    /// (with an `error{translation_dropped}` event) if the queue is full.
    /// `target_lang` is a per-call argument, mirroring `source_lang`, since
    /// both are session parameters rather than translator-instance state.
    pub fn submit(&self, request: RefinementRequest, source_lang: &str, target_lang: &str) {
        if let Some(realtime) = &self.realtime {
            for text in &request.source_segments {
                realtime.supersede(Fingerprint::new(text, Tier::Realtime, target_lang));
            }
        }
        {
            let mut queue = self.queue_len.lock();
            if queue.len() >= QUEUE_CAPACITY {
                self.bus.publish(
                    EventKind::Error,
                    serde_json::json!({
                        "kind": "translation_dropped",
                        "replaces": request.replaces,
                        "recoverable": true,
                    }),
                );
                return;
            }
            queue.push_back(());
        }

        let backend = self.backend.clone();
        let bus = self.bus.clone();
        let semaphore = self.semaphore.clone();
        let queue_len = self.queue_len.clone();
        let target_lang = target_lang.to_string();
        let source_lang = source_lang.to_string();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            queue_len.lock().pop_front();

            let translate_request = TranslateRequest {
                source_text: request.source_text,
                source_lang,
                target_lang,
            };

            let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(64);
            let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

            match backend.translate_stream(translate_request, tx).await {
                Ok(result) => {
                    bus.publish(
                        EventKind::TranslationUpdate,
                        serde_json::json!({
                            "tier": tier_label(request.tier),
                            "replaces": request.replaces,
                            "text": result.text,
                        }),
                    );
                }
                Err(e) => {
                    bus.publish(
                        EventKind::Error,
                        serde_json::json!({
                            "kind": "recoverable",
                            "replaces": request.replaces,
                            "message": e.to_string(),
                        }),
                    );
                }
            }
            drain.abort();
        });
    }
}

fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Sentence => "sentence",
        Tier::Paragraph => "paragraph",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use uuid::Uuid;
    use voice_agent_core::{Result, TranslateResult};

    struct EchoBackend;

    #[async_trait]
    impl TranslationBackend for EchoBackend {
        async fn translate_stream(&self, request: TranslateRequest, _tx: tokio::sync::mpsc::Sender<String>) -> Result<TranslateResult> {
            Ok(TranslateResult {
                text: format!("refined:{}", request.source_text),
                tentative: false,
            })
        }

        fn model_name(&self) -> &str {
            "echo-large"
        }
    }

    #[tokio::test]
    async fn refinement_publishes_translation_update_with_replaces() {
        let bus = Arc::new(EventBus::new(Uuid::new_v4()));
        let mut sub = bus.subscribe();
        let translator = HighQualityTranslator::new(Arc::new(EchoBackend), bus);

        translator.submit(
            RefinementRequest {
                tier: Tier::Sentence,
                replaces: vec!["s0".to_string(), "s1".to_string()],
                source_text: "Hello world.".to_string(),
                source_segments: vec!["Hello".to_string(), "world.".to_string()],
            },
            "en",
            "ja",
        );

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::TranslationUpdate);
        assert_eq!(event.payload["tier"], "sentence");
    }
}
