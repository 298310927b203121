//! ASR Segment: the unit C2 emits and C3 routes.

use serde::{Deserialize, Serialize};

/// An interim or final hypothesis from the ASR provider.
///
/// `id` is stable within a session and monotonically assigned; interim
/// updates may share an `id` across revisions until the segment is
/// finalized. Once `is_final` is true for a given `id`, no further updates
/// for that `id` may be emitted (enforced by C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrSegment {
    pub id: String,
    pub text: String,
    pub start_ts: f64,
    pub end_ts: f64,
    pub confidence: f32,
    pub is_final: bool,
    pub language: String,
}

impl AsrSegment {
    pub fn new(id: impl Into<String>, text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            start_ts: 0.0,
            end_ts: 0.0,
            confidence: 1.0,
            is_final: false,
            language: language.into(),
        }
    }
}
