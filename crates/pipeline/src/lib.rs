//! Streaming audio-to-caption-to-translation pipeline engine.
//!
//! Wires the thirteen components (C1-C13) described by the core crate's
//! data model into one session driver: audio framing, the ASR WebSocket
//! adapter, segment routing, draft and high-quality translation, display
//! coalescing, sentence/paragraph aggregation, progressive summarization,
//! the event bus, and history.

pub mod asr_adapter;
pub mod audio_framer;
pub mod coalescer;
pub mod display_sync;
pub mod event_bus;
pub mod history;
pub mod hq_translator;
pub mod paragraph_builder;
pub mod realtime_translator;
pub mod segment_router;
pub mod sentence_combiner;
pub mod session;
pub mod summarizer;

pub use asr_adapter::DeepgramAsrAdapter;
pub use audio_framer::AudioFramer;
pub use coalescer::{Coalescer, CoalescerConfig, Emission, SlotMetrics};
pub use display_sync::DisplaySync;
pub use event_bus::{EventBus, EventSubscriber};
pub use history::RingBuffer;
pub use hq_translator::{HighQualityTranslator, RefinementRequest};
pub use paragraph_builder::{ParagraphBuilder, ParagraphBuilderConfig};
pub use realtime_translator::RealtimeTranslator;
pub use segment_router::{Routed, SegmentRouter, ORIGINAL_SLOT};
pub use sentence_combiner::SentenceCombiner;
pub use session::{CommandOutcome, PipelineSession};
pub use summarizer::{ProgressiveSummarizer, SummarizerConfig};
