//! C6: Three-Line Display Sync.
//!
//! Maintains an ordered window of up to three `DisplayPair`s at positions
//! `oldest(0.3) / older(0.6) / recent(1.0)`. Coalesced updates that refer to
//! the current `recent` pair mutate in place; anything else shifts the
//! window and introduces a new `recent` pair, dropping overflow.

use voice_agent_core::{DisplayPair, Position};

pub struct DisplaySync {
    oldest: Option<DisplayPair>,
    older: Option<DisplayPair>,
    recent: Option<DisplayPair>,
}

impl Default for DisplaySync {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySync {
    pub fn new() -> Self {
        Self {
            oldest: None,
            older: None,
            recent: None,
        }
    }

    /// Apply a coalesced update for `pair_id`. If it matches the current
    /// `recent` pair it's mutated in place; otherwise the window shifts
    /// `recent -> older -> oldest`, dropping any prior `oldest`.
    pub fn apply(&mut self, pair_id: &str, source_text: &str, translation_text: &str) {
        if let Some(recent) = self.recent.as_mut() {
            if recent.pair_id == pair_id {
                recent.source_text = source_text.to_string();
                recent.translation_text = translation_text.to_string();
                return;
            }
        }

        self.oldest = self.older.take();
        self.older = self.recent.take();
        if let Some(older) = self.older.as_mut() {
            older.position = Position::Older;
            older.opacity = Position::Older.opacity();
        }
        if let Some(oldest) = self.oldest.as_mut() {
            oldest.position = Position::Oldest;
            oldest.opacity = Position::Oldest.opacity();
        }

        let mut pair = DisplayPair::new(pair_id, Position::Recent);
        pair.source_text = source_text.to_string();
        pair.translation_text = translation_text.to_string();
        self.recent = Some(pair);
    }

    /// Snapshot the current window for a `display_update` event. Always
    /// `<= 3` entries with unique positions, per §8 invariant 5.
    pub fn snapshot(&self) -> Vec<DisplayPair> {
        [&self.oldest, &self.older, &self.recent]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_never_exceeds_three_pairs() {
        let mut sync = DisplaySync::new();
        for i in 0..5 {
            sync.apply(&format!("pair-{i}"), "src", "tgt");
        }
        let snapshot = sync.snapshot();
        assert!(snapshot.len() <= 3);
    }

    #[test]
    fn same_pair_id_mutates_recent_in_place() {
        let mut sync = DisplaySync::new();
        sync.apply("pair-0", "hello", "");
        sync.apply("pair-0", "hello world", "translated");
        let snapshot = sync.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].source_text, "hello world");
        assert_eq!(snapshot[0].position, Position::Recent);
    }

    #[test]
    fn new_pair_shifts_window_with_correct_opacities() {
        let mut sync = DisplaySync::new();
        sync.apply("pair-0", "a", "a-t");
        sync.apply("pair-1", "b", "b-t");
        sync.apply("pair-2", "c", "c-t");

        let snapshot = sync.snapshot();
        let positions: Vec<Position> = snapshot.iter().map(|p| p.position).collect();
        assert!(positions.contains(&Position::Oldest));
        assert!(positions.contains(&Position::Older));
        assert!(positions.contains(&Position::Recent));

        let recent = snapshot.iter().find(|p| p.position == Position::Recent).unwrap();
        assert_eq!(recent.opacity, 1.0);
        let oldest = snapshot.iter().find(|p| p.position == Position::Oldest).unwrap();
        assert_eq!(oldest.opacity, 0.3);
    }
}
