//! C7: Sentence Combiner.
//!
//! Buffers final segments and emits a `Sentence` immediately after each
//! addition (minimizing data loss per §9's open question), on a 2000 ms
//! since-last-segment timeout, or on explicit flush at session end.

use std::time::{Duration, Instant};

use voice_agent_core::{AsrSegment, Sentence};

const TIMEOUT_MS: u64 = 2000;

pub struct SentenceCombiner {
    buffer: Vec<AsrSegment>,
    last_added: Instant,
    next_id: u64,
}

impl Default for SentenceCombiner {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceCombiner {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            last_added: Instant::now(),
            next_id: 0,
        }
    }

    /// Add a final segment and emit immediately — the implementation favors
    /// minimizing data loss over waiting for sentence-final punctuation.
    pub fn add(&mut self, segment: AsrSegment) -> Sentence {
        self.buffer.push(segment);
        self.last_added = Instant::now();
        self.emit()
    }

    /// Called on a timer tick; flushes the buffer if it has been non-empty
    /// for longer than the 2000 ms timeout.
    pub fn tick(&mut self) -> Option<Sentence> {
        if self.buffer.is_empty() {
            return None;
        }
        if self.last_added.elapsed() >= Duration::from_millis(TIMEOUT_MS) {
            Some(self.emit())
        } else {
            None
        }
    }

    /// Unconditional flush for session end; returns `None` if the buffer is
    /// already empty.
    pub fn flush(&mut self) -> Option<Sentence> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.emit())
        }
    }

    fn emit(&mut self) -> Sentence {
        let id = format!("sent-{}", self.next_id);
        self.next_id += 1;
        let sentence = Sentence::from_segments(id, &self.buffer);
        self.buffer.clear();
        sentence
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
    fn emits_immediately_on_each_added_segment() {
        let mut combiner = SentenceCombiner::new();
        let sentence = combiner.add(seg("s0", "Hello world."));
        assert_eq!(sentence.segment_ids, vec!["s0".to_string()]);
        assert_eq!(sentence.source_text, "Hello world.");
    }

    #[test]
    fn flush_on_session_end_drains_buffer() {
        let mut combiner = SentenceCombiner::new();
        // emit() is called per add(), so buffer is cleared; flush with
        // nothing pending returns None.
        assert!(combiner.flush().is_none());
    }

    #[test]
    fn segment_order_is_preserved() {
        let mut combiner = SentenceCombiner::new();
        combiner.buffer.push(seg("s0", "Hello"));
        combiner.buffer.push(seg("s1", "world."));
        let sentence = combiner.flush().unwrap();
        assert_eq!(sentence.segment_ids, vec!["s0".to_string(), "s1".to_string()]);
        assert_eq!(sentence.source_text, "Hello world.");
    }
}
