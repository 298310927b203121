//! C4: Realtime Translator.
//!
//! Bounded queue of Translation Jobs (capacity 32, drop-oldest beyond),
//! up to 4 concurrent streaming requests, at-most-one-in-flight per
//! fingerprint. First-token soft deadline 1000 ms, hard timeout 5000 ms,
//! one transport-error retry at 250 ms.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use voice_agent_core::{EventKind, Fingerprint, JobState, Tier, TranslateRequest, TranslationBackend, TranslationJob};

use crate::event_bus::EventBus;

const QUEUE_CAPACITY: usize = 32;
const MAX_CONCURRENT: usize = 4;
const FIRST_TOKEN_SOFT_MS: u64 = 1_000;
const HARD_TIMEOUT_MS: u64 = 5_000;
const RETRY_DELAY_MS: u64 = 250;

pub struct RealtimeTranslator {
    backend: Arc<dyn TranslationBackend>,
    bus: Arc<EventBus>,
    semaphore: Arc<Semaphore>,
    queue: Arc<Mutex<VecDeque<TranslationJob>>>,
    in_flight: Arc<Mutex<HashMap<Fingerprint, JobState>>>,
}

impl RealtimeTranslator {
    pub fn new(backend: Arc<dyn TranslationBackend>, bus: Arc<EventBus>) -> Self {
        Self {
            backend,
            bus,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT)),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Enqueue a final segment for draft translation. If the queue is at
    /// capacity, the oldest queued (not in-flight) job is dropped and an
    /// `error{translation_dropped}` event is published for it. `target_lang`
    /// is a per-call argument, not session-fixed state, since a session's
    /// target language is set at `startListening` time.
    pub fn submit(&self, segment_id: impl Into<String>, source_text: impl Into<String>, source_lang: &str, target_lang: &str) {
        let segment_id = segment_id.into();
        let job = TranslationJob::new(segment_id.clone(), source_text, Tier::Realtime, target_lang, HARD_TIMEOUT_MS);

        {
            let mut queue = self.queue.lock();
            if queue.len() >= QUEUE_CAPACITY {
                if let Some(dropped) = queue.pop_front() {
                    self.bus.publish(
                        EventKind::Error,
                        serde_json::json!({
                            "kind": "translation_dropped",
                            "segment_id": dropped.segment_id,
                            "recoverable": true,
                        }),
                    );
                }
            }
            queue.push_back(job.clone());
        }

        self.spawn_job(job, source_lang.to_string(), target_lang.to_string());
    }

    fn spawn_job(&self, job: TranslationJob, source_lang: String, target_lang: String) {
        {
            let mut in_flight = self.in_flight.lock();
            if let Some(JobState::InFlight) | Some(JobState::Streaming) = in_flight.get(&job.fingerprint) {
                // Duplicate submission for a fingerprint already in flight:
                // the existing subscription serves this caller too.
                return;
            }
            in_flight.insert(job.fingerprint, JobState::InFlight);
        }

        let backend = self.backend.clone();
        let bus = self.bus.clone();
        let semaphore = self.semaphore.clone();
        let in_flight = self.in_flight.clone();
        let queue = self.queue.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            queue.lock().retain(|j| j.fingerprint != job.fingerprint);

            let deadline = tokio::time::sleep(Duration::from_millis(HARD_TIMEOUT_MS));
            tokio::pin!(deadline);
            let soft_deadline = tokio::time::sleep(Duration::from_millis(FIRST_TOKEN_SOFT_MS));
            tokio::pin!(soft_deadline);

            let mut accumulated = String::new();
            let mut slow_paint_emitted = false;
            let mut token_stream_closed = false;
            let mut retries_left = 1u32;

            let (mut rx, mut result_rx) = spawn_attempt(
                backend.clone(),
                TranslateRequest {
                    source_text: job.source_text.clone(),
                    source_lang: source_lang.clone(),
                    target_lang: target_lang.clone(),
                },
            );

            loop {
                tokio::select! {
                    biased;
                    _ = &mut deadline => {
                        bus.publish(EventKind::TranslationUpdate, serde_json::json!({
                            "segment_id": job.segment_id,
                            "text": accumulated,
                            "tentative": true,
                        }));
                        bus.publish(EventKind::TranslationComplete, serde_json::json!({
                            "segment_id": job.segment_id,
                            "error": "timeout",
                        }));
                        in_flight.lock().insert(job.fingerprint, JobState::TimedOut);
                        return;
                    }
                    // Guarded on `slow_paint_emitted`, not `first_token_seen`: once
                    // this fires it must disarm for good, or a session with no
                    // tokens ever arriving would have this branch ready on every
                    // loop iteration and starve the token-read arm below.
                    _ = &mut soft_deadline, if !slow_paint_emitted => {
                        slow_paint_emitted = true;
                        bus.publish(EventKind::Stats, serde_json::json!({
                            "kind": "slow_first_paint",
                            "segment_id": job.segment_id,
                        }));
                    }
                    result = &mut result_rx => {
                        let message = match result {
                            Ok(Ok(result)) => {
                                bus.publish(EventKind::TranslationComplete, serde_json::json!({
                                    "segment_id": job.segment_id,
                                    "text": result.text,
                                }));
                                in_flight.lock().insert(job.fingerprint, JobState::Completed);
                                return;
                            }
                            Ok(Err(e)) => e.to_string(),
                            Err(_) => "translation task ended without a result".to_string(),
                        };

                        if retries_left > 0 {
                            retries_left -= 1;
                            tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                            accumulated.clear();
                            token_stream_closed = false;
                            let (new_rx, new_result_rx) = spawn_attempt(
                                backend.clone(),
                                TranslateRequest {
                                    source_text: job.source_text.clone(),
                                    source_lang: source_lang.clone(),
                                    target_lang: target_lang.clone(),
                                },
                            );
                            rx = new_rx;
                            result_rx = new_result_rx;
                            continue;
                        }

                        bus.publish(EventKind::Error, serde_json::json!({
                            "kind": "recoverable",
                            "segment_id": job.segment_id,
                            "message": message,
                        }));
                        in_flight.lock().insert(job.fingerprint, JobState::Superseded);
                        return;
                    }
                    token = rx.recv(), if !token_stream_closed => {
                        match token {
                            Some(delta) => {
                                accumulated.push_str(&delta);
                                bus.publish(EventKind::TranslationUpdate, serde_json::json!({
                                    "segment_id": job.segment_id,
                                    "text": accumulated,
                                    "tentative": false,
                                }));
                            }
                            None => token_stream_closed = true,
                        }
                    }
                }
            }
        });
    }

    /// Mark any in-flight job whose fingerprint matches a superseded
    /// segment as `Superseded`; its partial output is discarded from
    /// display (history retains it for diagnostics via C9's own write).
    pub fn supersede(&self, fingerprint: Fingerprint) {
        self.in_flight.lock().insert(fingerprint, JobState::Superseded);
    }
}

/// Drive one streaming attempt on its own task, returning the token-delta
/// receiver and a oneshot carrying the backend's terminal result.
fn spawn_attempt(
    backend: Arc<dyn TranslationBackend>,
    request: TranslateRequest,
) -> (
    mpsc::Receiver<String>,
    tokio::sync::oneshot::Receiver<voice_agent_core::Result<voice_agent_core::TranslateResult>>,
) {
    let (tx, rx) = mpsc::channel::<String>(64);
    let (result_tx, result_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let result = backend.translate_stream(request, tx).await;
        let _ = result_tx.send(result);
    });
    (rx, result_rx)
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
        async fn translate_stream(&self, request: TranslateRequest, tx: mpsc::Sender<String>) -> Result<TranslateResult> {
            let _ = tx.send(request.source_text.clone()).await;
            Ok(TranslateResult {
                text: request.source_text,
                tentative: false,
            })
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn submit_publishes_a_translation_complete_event() {
        let bus = Arc::new(EventBus::new(Uuid::new_v4()));
        let mut sub = bus.subscribe();
        let translator = RealtimeTranslator::new(Arc::new(EchoBackend), bus);

        translator.submit("seg-0", "Hello world.", "en", "ja");

        let mut saw_complete = false;
        for _ in 0..10 {
            if let Some(event) = sub.recv().await {
                if event.kind == EventKind::TranslationComplete {
                    saw_complete = true;
                    break;
                }
            }
        }
        assert!(saw_complete);
    }
}
