//! C13: Ring Buffer / History.
//!
//! Append-only log of finalized `(source, translation, timestamp)` triples
//! with a soft cap of 180 minutes. When the cap is approached, isolated
//! segment-level entries older than 30 minutes are dropped in favor of their
//! paragraph-level rollups; anything within the last 30 minutes is never
//! dropped.

use std::collections::VecDeque;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use voice_agent_core::{HistoryEntry, Tier};

const SOFT_CAP_MINUTES: i64 = 180;
const PROTECTED_WINDOW_MINUTES: i64 = 30;

pub struct RingBuffer {
    entries: VecDeque<HistoryEntry>,
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBuffer {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        self.compact_if_needed();
    }

    fn compact_if_needed(&mut self) {
        let Some(oldest) = self.entries.front() else {
            return;
        };
        let span = Utc::now().signed_duration_since(oldest.timestamp);
        if span <= ChronoDuration::minutes(SOFT_CAP_MINUTES) {
            return;
        }

        let cutoff = Utc::now() - ChronoDuration::minutes(PROTECTED_WINDOW_MINUTES);
        self.entries
            .retain(|e| e.timestamp >= cutoff || e.paragraph_id.is_some());
    }

    /// Replace the stored translation for `segment_id` if `tier` supersedes
    /// the tier currently recorded (S6: highest tier wins).
    pub fn replace_translation(&mut self, segment_id: &str, translation: String, tier: Tier) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.segment_id == segment_id) {
            if tier.supersedes(entry.tier) {
                entry.translation = translation;
                entry.tier = tier;
                return true;
            }
        }
        false
    }

    pub fn get(&self, segment_id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.segment_id == segment_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn attach_paragraph(&mut self, segment_id: &str, paragraph_id: impl Into<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.segment_id == segment_id) {
            entry.paragraph_id = Some(paragraph_id.into());
        }
    }

    pub fn range_by_time(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect()
    }

    pub fn range_by_paragraph(&self, paragraph_id: &str) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.paragraph_id.as_deref() == Some(paragraph_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_translation_only_climbs_the_ladder() {
        let mut buf = RingBuffer::new();
        buf.push(HistoryEntry::new("s1", "hello", "draft", Tier::Realtime));

        assert!(buf.replace_translation("s1", "refined".to_string(), Tier::Paragraph));
        assert_eq!(buf.entries[0].translation, "refined");

        assert!(!buf.replace_translation("s1", "stale".to_string(), Tier::Realtime));
        assert_eq!(buf.entries[0].translation, "refined");
    }

    #[test]
    fn range_by_paragraph_filters_to_attached_entries() {
        let mut buf = RingBuffer::new();
        buf.push(HistoryEntry::new("s1", "a", "a-t", Tier::Realtime));
        buf.push(HistoryEntry::new("s2", "b", "b-t", Tier::Realtime));
        buf.attach_paragraph("s1", "p1");

        let results = buf.range_by_paragraph("p1");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].segment_id, "s1");
    }
}
