//! History Block: the entry shape appended to C13's ring buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finalized `(source, translation, timestamp)` triple, plus enough
/// lineage to support compaction and tier-aware replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub segment_id: String,
    pub paragraph_id: Option<String>,
    pub source: String,
    pub translation: String,
    pub tier: crate::job::Tier,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        segment_id: impl Into<String>,
        source: impl Into<String>,
        translation: impl Into<String>,
        tier: crate::job::Tier,
    ) -> Self {
        Self {
            segment_id: segment_id.into(),
            paragraph_id: None,
            source: source.into(),
            translation: translation.into(),
            tier,
            timestamp: Utc::now(),
        }
    }
}
