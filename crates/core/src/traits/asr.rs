//! ASR Stream Adapter trait (C2): a pluggable connection to a streaming
//! speech recognition provider.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::audio::AudioFrame;
use crate::error::Result;
use crate::segment::AsrSegment;

/// Connection lifecycle for a streaming ASR provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrConnectionState {
    Disconnected,
    Connecting,
    Open,
    Draining,
    Closed,
    Failed,
}

/// A live connection to a streaming ASR provider.
///
/// Implementations own one outbound socket, accept audio frames via
/// `send_frame`, and expose a stream of `AsrSegment`s. Reconnect policy
/// (backoff, frame buffering during reconnect) is the implementation's
/// responsibility; the trait only exposes the resulting state.
#[async_trait]
pub trait AsrAdapter: Send + Sync {
    /// Push one audio frame onto the outbound socket. Implementations may
    /// buffer briefly under backpressure but must not block indefinitely.
    async fn send_frame(&self, frame: AudioFrame) -> Result<()>;

    /// Subscribe to the segment stream. Interim segments share an `id`
    /// across revisions; once a segment is emitted with `is_final = true`
    /// no further updates for that `id` follow.
    fn segments(&self) -> Pin<Box<dyn Stream<Item = Result<AsrSegment>> + Send>>;

    /// Current connection state, for the pipeline state machine to observe.
    fn state(&self) -> AsrConnectionState;

    /// Request a graceful close with a drain window.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_stream::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockAsr {
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AsrAdapter for MockAsr {
        async fn send_frame(&self, _frame: AudioFrame) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn segments(&self) -> Pin<Box<dyn Stream<Item = Result<AsrSegment>> + Send>> {
            Box::pin(stream! {
                yield Ok(AsrSegment::new("seg-0", "hello", "en"));
            })
        }

        fn state(&self) -> AsrConnectionState {
            AsrConnectionState::Open
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn mock_adapter_counts_sent_frames() {
        let mock = MockAsr {
            sent: Arc::new(AtomicUsize::new(0)),
        };
        mock.send_frame(AudioFrame::new(
            vec![0.0; 640],
            crate::audio::SampleRate::Hz16000,
            crate::audio::Channels::Mono,
            0,
        ))
        .await
        .unwrap();
        assert_eq!(mock.sent.load(Ordering::SeqCst), 1);
    }
}
