//! C8: Paragraph Builder.
//!
//! Groups finals into paragraphs of `min_duration_ms..max_duration_ms`,
//! flushing when the minimum is met and either the silence gap or the
//! maximum duration is reached. Never drops segments; `flush()` always
//! emits whatever is buffered at session end, even under `min_duration`.

use std::time::{Duration, Instant};

use voice_agent_core::{AsrSegment, Paragraph};

pub struct ParagraphBuilderConfig {
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub silence_threshold_ms: u64,
}

impl Default for ParagraphBuilderConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 10_000,
            max_duration_ms: 40_000,
            silence_threshold_ms: 2_000,
        }
    }
}

pub struct ParagraphBuilder {
    config: ParagraphBuilderConfig,
    buffer: Vec<AsrSegment>,
    start: Option<Instant>,
    last_added: Option<Instant>,
    next_id: u64,
}

impl ParagraphBuilder {
    pub fn new(config: ParagraphBuilderConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            start: None,
            last_added: None,
            next_id: 0,
        }
    }

    /// Add a final segment. Returns a completed `Paragraph` if adding it
    /// crosses the min-duration-and-(silence-or-max) boundary; the segment
    /// that triggered the flush is NOT included in the emitted paragraph —
    /// it starts the next one.
    pub fn add(&mut self, segment: AsrSegment) -> Option<Paragraph> {
        let now = Instant::now();

        if let (Some(start), Some(last_added)) = (self.start, self.last_added) {
            let duration = now.duration_since(start);
            let silence_gap = now.duration_since(last_added);
            let min_met = duration >= Duration::from_millis(self.config.min_duration_ms);
            let should_flush = min_met
                && (silence_gap >= Duration::from_millis(self.config.silence_threshold_ms)
                    || duration >= Duration::from_millis(self.config.max_duration_ms));

            if should_flush {
                let paragraph = self.emit();
                self.start = Some(now);
                self.buffer.push(segment);
                self.last_added = Some(now);
                return Some(paragraph);
            }
        }

        if self.start.is_none() {
            self.start = Some(now);
        }
        self.buffer.push(segment);
        self.last_added = Some(now);
        None
    }

    /// Unconditional flush for session end; emits even if `min_duration` has
    /// not been met.
    pub fn flush(&mut self) -> Option<Paragraph> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.emit())
        }
    }

    fn emit(&mut self) -> Paragraph {
        let id = format!("para-{}", self.next_id);
        self.next_id += 1;
        let paragraph = Paragraph::from_segments(id, &self.buffer);
        self.buffer.clear();
        self.start = None;
        self.last_added = None;
        paragraph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: &str, text: &str) -> AsrSegment {
        let mut s = AsrSegment::new(id, text, "en");
        s.is_final = true;
        s
    }

    #[test]
    fn never_drops_segments_on_session_end_flush() {
        let mut builder = ParagraphBuilder::new(ParagraphBuilderConfig::default());
        builder.add(seg("s0", "Hello"));
        let paragraph = builder.flush().unwrap();
        assert_eq!(paragraph.segment_ids, vec!["s0".to_string()]);
    }

    #[test]
    fn word_count_is_whitespace_split() {
        let mut builder = ParagraphBuilder::new(ParagraphBuilderConfig::default());
        builder.add(seg("s0", "one two three"));
        let paragraph = builder.flush().unwrap();
        assert_eq!(paragraph.word_count, 3);
    }

    #[test]
    fn empty_buffer_flush_is_none() {
        let mut builder = ParagraphBuilder::new(ParagraphBuilderConfig::default());
        assert!(builder.flush().is_none());
    }
}
