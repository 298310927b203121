//! Translation Job: the unit C4 and C9 queue, dedupe, and race against deadlines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Quality class of a translation. Ordered: `Realtime < Sentence < Paragraph`.
/// `UserInput` and `SummaryTranslate` are side tiers that never supersede or
/// get superseded by the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Realtime,
    Sentence,
    Paragraph,
    UserInput,
    SummaryTranslate,
}

impl Tier {
    /// Whether `self` may replace a translation currently stamped with `current`.
    /// Only the Realtime/Sentence/Paragraph ladder participates in supersession;
    /// ties are broken in favor of the later arrival by the caller.
    pub fn supersedes(self, current: Tier) -> bool {
        use Tier::*;
        matches!(
            (self, current),
            (Sentence, Realtime) | (Paragraph, Realtime) | (Paragraph, Sentence)
        ) || self == current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    InFlight,
    Streaming,
    Completed,
    TimedOut,
    Failed,
    Superseded,
}

/// A stable hash of `(normalized_source_text, tier, target_lang)`.
///
/// At most one job in state `{InFlight, Streaming}` may exist per
/// fingerprint at a time; duplicate submissions collapse onto the
/// existing job's subscription instead of spawning a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn new(source_text: &str, tier: Tier, target_lang: &str) -> Self {
        let normalized = source_text.trim().to_lowercase();
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        normalized.hash(&mut hasher);
        (tier as u8).hash(&mut hasher);
        target_lang.hash(&mut hasher);
        Self(hasher.finish())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationJob {
    pub fingerprint: Fingerprint,
    pub segment_id: String,
    pub source_text: String,
    pub tier: Tier,
    pub started_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
    pub state: JobState,
}

impl TranslationJob {
    pub fn new(
        segment_id: impl Into<String>,
        source_text: impl Into<String>,
        tier: Tier,
        target_lang: &str,
        timeout_ms: u64,
    ) -> Self {
        let source_text = source_text.into();
        let fingerprint = Fingerprint::new(&source_text, tier, target_lang);
        let started_at = Utc::now();
        Self {
            fingerprint,
            segment_id: segment_id.into(),
            source_text,
            tier,
            started_at,
            timeout_at: started_at + chrono::Duration::milliseconds(timeout_ms as i64),
            state: JobState::Queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_matches_ladder() {
        assert!(Tier::Realtime < Tier::Sentence);
        assert!(Tier::Sentence < Tier::Paragraph);
    }

    #[test]
    fn supersession_only_climbs_the_ladder() {
        assert!(Tier::Sentence.supersedes(Tier::Realtime));
        assert!(Tier::Paragraph.supersedes(Tier::Sentence));
        assert!(!Tier::Realtime.supersedes(Tier::Sentence));
    }

    #[test]
    fn fingerprint_is_stable_for_normalized_text() {
        let a = Fingerprint::new("Hello world", Tier::Realtime, "ja");
        let b = Fingerprint::new("  hello world  ", Tier::Realtime, "ja");
        assert_eq!(a, b);
    }
}
