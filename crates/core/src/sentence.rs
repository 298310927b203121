//! Sentence: produced by C7 grouping finals by punctuation/timeout.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub id: String,
    pub segment_ids: Vec<String>,
    pub source_text: String,
    pub start_ts: f64,
    pub end_ts: f64,
    pub draft_translation: Option<String>,
    pub refined_translation: Option<String>,
}

impl Sentence {
    /// Build a sentence from buffered final segments, space-joining trimmed
    /// text and preserving input order in `segment_ids`.
    pub fn from_segments(id: impl Into<String>, segments: &[crate::segment::AsrSegment]) -> Self {
        let source_text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let start_ts = segments.first().map(|s| s.start_ts).unwrap_or(0.0);
        let end_ts = segments.last().map(|s| s.end_ts).unwrap_or(0.0);

        Self {
            id: id.into(),
            segment_ids: segments.iter().map(|s| s.id.clone()).collect(),
            source_text,
            start_ts,
            end_ts,
            draft_translation: None,
            refined_translation: None,
        }
    }
}
