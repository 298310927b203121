//! Paragraph: produced by C8 grouping finals/sentences into 10-40s blocks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: String,
    pub segment_ids: Vec<String>,
    pub raw_text: String,
    pub start_ts: f64,
    pub end_ts: f64,
    pub word_count: usize,
    pub refined_translation: Option<String>,
}

impl Paragraph {
    pub fn from_segments(id: impl Into<String>, segments: &[crate::segment::AsrSegment]) -> Self {
        let raw_text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let word_count = raw_text.split_whitespace().count();
        let start_ts = segments.first().map(|s| s.start_ts).unwrap_or(0.0);
        let end_ts = segments.last().map(|s| s.end_ts).unwrap_or(0.0);

        Self {
            id: id.into(),
            segment_ids: segments.iter().map(|s| s.id.clone()).collect(),
            raw_text,
            start_ts,
            end_ts,
            word_count,
            refined_translation: None,
        }
    }
}
