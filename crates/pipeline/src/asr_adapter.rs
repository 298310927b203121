//! C2: ASR Stream Adapter.
//!
//! One outbound WebSocket connection to a Deepgram-shaped streaming ASR
//! endpoint. Owns a `Disconnected -> Connecting -> Open -> (Draining |
//! Closed | Failed)` state machine with exponential-backoff reconnect and
//! frame buffering while the socket is down.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, warn};

use voice_agent_core::{AsrAdapter, AsrConnectionState, AsrSegment, AudioFrame, Error, Result};
use voice_agent_config::AsrConfig;

const RECONNECT_INITIAL_MS: u64 = 250;
const RECONNECT_CAP_MS: u64 = 8_000;
const MAX_ATTEMPTS_PER_WINDOW: u32 = 5;
const ATTEMPT_WINDOW_SECS: u64 = 60;
const FRAME_BUFFER_CAP: usize = 50;

/// Deepgram's tagged streaming envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum DeepgramMessage {
    Results {
        channel: DeepgramChannel,
        is_final: bool,
        start: f64,
        duration: f64,
    },
    UtteranceEnd {
        #[serde(default)]
        last_word_end: f64,
    },
    Metadata {
        #[serde(default)]
        request_id: String,
    },
    SpeechStarted {},
}

#[derive(Debug, Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

/// Exponential backoff with a 60-second attempt-count window; resets once
/// the window elapses.
struct ReconnectBackoff {
    attempts: u32,
    window_start: Instant,
}

impl ReconnectBackoff {
    fn new() -> Self {
        Self {
            attempts: 0,
            window_start: Instant::now(),
        }
    }

    /// Returns the delay for the next attempt, or `None` if the attempt
    /// budget for this window is exhausted.
    fn next_delay(&mut self) -> Option<Duration> {
        if self.window_start.elapsed() >= Duration::from_secs(ATTEMPT_WINDOW_SECS) {
            self.attempts = 0;
            self.window_start = Instant::now();
        }
        if self.attempts >= MAX_ATTEMPTS_PER_WINDOW {
            return None;
        }
        let ms = RECONNECT_INITIAL_MS.saturating_mul(1 << self.attempts).min(RECONNECT_CAP_MS);
        self.attempts += 1;
        Some(Duration::from_millis(ms))
    }

    fn reset(&mut self) {
        self.attempts = 0;
        self.window_start = Instant::now();
    }
}

/// Assigns a stable `id` to consecutive interim revisions of the same
/// utterance, minting a fresh one once a segment finalizes. Falls back to
/// a monotonic counter since the provider gives no utterance identifier.
struct SegmentIdAllocator {
    session_id: String,
    counter: u64,
    pending: Option<String>,
}

impl SegmentIdAllocator {
    fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            counter: 0,
            pending: None,
        }
    }

    fn id_for(&mut self, is_final: bool) -> String {
        let id = self.pending.clone().unwrap_or_else(|| {
            let id = format!("{}-{}", self.session_id, self.counter);
            self.counter += 1;
            id
        });
        if is_final {
            self.pending = None;
        } else {
            self.pending = Some(id.clone());
        }
        id
    }
}

/// Drop-oldest bounded queue of outbound frames, used while the socket is
/// reconnecting so capture isn't blocked.
struct FrameBuffer {
    frames: VecDeque<AudioFrame>,
    cap: usize,
}

impl FrameBuffer {
    fn new(cap: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            cap,
        }
    }

    fn push(&mut self, frame: AudioFrame) {
        if self.frames.len() >= self.cap {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    fn drain(&mut self) -> Vec<AudioFrame> {
        self.frames.drain(..).collect()
    }
}

const STATE_DISCONNECTED: u8 = 0;
const STATE_CONNECTING: u8 = 1;
const STATE_OPEN: u8 = 2;
const STATE_DRAINING: u8 = 3;
const STATE_CLOSED: u8 = 4;
const STATE_FAILED: u8 = 5;

fn decode_state(v: u8) -> AsrConnectionState {
    match v {
        STATE_CONNECTING => AsrConnectionState::Connecting,
        STATE_OPEN => AsrConnectionState::Open,
        STATE_DRAINING => AsrConnectionState::Draining,
        STATE_CLOSED => AsrConnectionState::Closed,
        STATE_FAILED => AsrConnectionState::Failed,
        _ => AsrConnectionState::Disconnected,
    }
}

/// Deepgram-shaped streaming ASR adapter over `tokio_tungstenite`.
pub struct DeepgramAsrAdapter {
    state: Arc<AtomicU8>,
    outbound: Arc<Mutex<FrameBuffer>>,
    frame_notify: Arc<tokio::sync::Notify>,
    segment_tx: mpsc::Sender<Result<AsrSegment>>,
    segment_rx: Mutex<Option<mpsc::Receiver<Result<AsrSegment>>>>,
}

impl DeepgramAsrAdapter {
    pub fn connect(config: AsrConfig, session_id: impl Into<String>) -> Self {
        let (segment_tx, segment_rx) = mpsc::channel(256);
        let state = Arc::new(AtomicU8::new(STATE_DISCONNECTED));
        let outbound = Arc::new(Mutex::new(FrameBuffer::new(FRAME_BUFFER_CAP)));
        let frame_notify = Arc::new(tokio::sync::Notify::new());

        let adapter = Self {
            state: state.clone(),
            outbound: outbound.clone(),
            frame_notify: frame_notify.clone(),
            segment_tx: segment_tx.clone(),
            segment_rx: Mutex::new(Some(segment_rx)),
        };

        let session_id = session_id.into();
        tokio::spawn(connection_loop(config, session_id, state, outbound, frame_notify, segment_tx));

        adapter
    }
}

async fn connection_loop(
    config: AsrConfig,
    session_id: String,
    state: Arc<AtomicU8>,
    outbound: Arc<Mutex<FrameBuffer>>,
    frame_notify: Arc<tokio::sync::Notify>,
    segment_tx: mpsc::Sender<Result<AsrSegment>>,
) {
    let mut backoff = ReconnectBackoff::new();

    loop {
        state.store(STATE_CONNECTING, Ordering::SeqCst);

        let url = format!(
            "{}?model={}&interim_results={}&endpointing={}&utterance_end_ms={}&smart_format={}",
            config.endpoint, config.model, config.interim, config.endpointing_ms, config.utterance_end_ms, config.smart_format
        );

        let mut request = match url.clone().into_client_request() {
            Ok(r) => r,
            Err(e) => {
                let _ = segment_tx.send(Err(Error::Protocol(e.to_string()))).await;
                state.store(STATE_FAILED, Ordering::SeqCst);
                return;
            }
        };
        if let Some(api_key) = &config.api_key {
            if let Ok(value) = format!("Token {api_key}").parse() {
                request.headers_mut().insert("Authorization", value);
            }
        }

        match connect_async(request).await {
            Ok((ws_stream, _response)) => {
                backoff.reset();
                state.store(STATE_OPEN, Ordering::SeqCst);
                debug!(session = %session_id, "asr socket open");

                let (mut write, mut read) = ws_stream.split();
                let mut ids = SegmentIdAllocator::new(session_id.clone());

                for frame in outbound.lock().drain() {
                    let _ = write.send(WsMessage::Binary(frame.to_pcm16().into())).await;
                }

                loop {
                    tokio::select! {
                        _ = frame_notify.notified() => {
                            for frame in outbound.lock().drain() {
                                if write.send(WsMessage::Binary(frame.to_pcm16().into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        msg = read.next() => {
                            match msg {
                                Some(Ok(WsMessage::Text(text))) => {
                                    if let Err(e) = handle_text_message(&text, &mut ids, &segment_tx).await {
                                        warn!(error = %e, "failed to parse asr message");
                                    }
                                }
                                Some(Ok(WsMessage::Close(_))) | None => {
                                    debug!(session = %session_id, "asr socket closed by peer");
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    error!(session = %session_id, error = %e, "asr socket read error");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "asr connect failed");
            }
        }

        if state.load(Ordering::SeqCst) == STATE_CLOSED {
            return;
        }

        match backoff.next_delay() {
            Some(delay) => {
                state.store(STATE_DISCONNECTED, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
            }
            None => {
                let _ = segment_tx
                    .send(Err(Error::Transport("asr reconnect budget exhausted".to_string())))
                    .await;
                state.store(STATE_FAILED, Ordering::SeqCst);
                return;
            }
        }
    }
}

async fn handle_text_message(
    text: &str,
    ids: &mut SegmentIdAllocator,
    segment_tx: &mpsc::Sender<Result<AsrSegment>>,
) -> Result<()> {
    let message: DeepgramMessage = serde_json::from_str(text).map_err(|e| Error::Protocol(e.to_string()))?;

    if let DeepgramMessage::Results { channel, is_final, start, duration } = message {
        let Some(alt) = channel.alternatives.into_iter().next() else {
            return Ok(());
        };
        if alt.transcript.is_empty() {
            return Ok(());
        }
        let id = ids.id_for(is_final);
        let mut segment = AsrSegment::new(id, alt.transcript, "en");
        segment.start_ts = start;
        segment.end_ts = start + duration;
        segment.confidence = alt.confidence;
        segment.is_final = is_final;
        let _ = segment_tx.send(Ok(segment)).await;
    }
    Ok(())
}

#[async_trait]
impl AsrAdapter for DeepgramAsrAdapter {
    async fn send_frame(&self, frame: AudioFrame) -> Result<()> {
        self.outbound.lock().push(frame);
        self.frame_notify.notify_one();
        Ok(())
    }

    fn segments(&self) -> Pin<Box<dyn Stream<Item = Result<AsrSegment>> + Send>> {
        let mut guard = self.segment_rx.lock();
        let rx = guard.take().expect("segments() may only be subscribed once");
        Box::pin(async_stream::stream! {
            let mut rx = rx;
            while let Some(item) = rx.recv().await {
                yield item;
            }
        })
    }

    fn state(&self) -> AsrConnectionState {
        decode_state(self.state.load(Ordering::SeqCst))
    }

    async fn close(&self) -> Result<()> {
        self.state.store(STATE_DRAINING, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = ReconnectBackoff::new();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(250)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(1000)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(4000)));
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn segment_id_stays_stable_across_interims_then_rotates_on_final() {
        let mut ids = SegmentIdAllocator::new("sess");
        let a = ids.id_for(false);
        let b = ids.id_for(false);
        assert_eq!(a, b);
        let c = ids.id_for(true);
        assert_eq!(b, c);
        let d = ids.id_for(false);
        assert_ne!(c, d);
    }

    #[test]
    fn frame_buffer_drops_oldest_beyond_capacity() {
        let mut buf = FrameBuffer::new(2);
        buf.push(AudioFrame::new(vec![0.0; 640], voice_agent_core::SampleRate::Hz16000, voice_agent_core::Channels::Mono, 0));
        buf.push(AudioFrame::new(vec![0.0; 640], voice_agent_core::SampleRate::Hz16000, voice_agent_core::Channels::Mono, 1));
        buf.push(AudioFrame::new(vec![0.0; 640], voice_agent_core::SampleRate::Hz16000, voice_agent_core::Channels::Mono, 2));
        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].sequence, 1);
        assert_eq!(drained[1].sequence, 2);
    }
}
