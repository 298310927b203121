//! C5: Stream Coalescer.
//!
//! Per display slot, holds the latest pending `(text, translation)` and a
//! monotonic version. Emits on terminal punctuation, `is_final`, explicit
//! force, a debounce window, or a force-commit window — whichever comes
//! first — and suppresses exact duplicate emissions.

use std::collections::HashMap;
use std::time::{Duration, Instant};

const TERMINAL_PUNCTUATION: &[char] = &['.', '?', '!', '。', '、', '！', '？'];

#[derive(Debug, Clone, Default)]
pub struct SlotMetrics {
    pub total_segments: u64,
    pub emitted_count: u64,
    pub duplicate_suppressions: u64,
    hold_ms_sum: u64,
    hold_samples: u64,
}

impl SlotMetrics {
    pub fn avg_hold_ms(&self) -> f64 {
        if self.hold_samples == 0 {
            0.0
        } else {
            self.hold_ms_sum as f64 / self.hold_samples as f64
        }
    }
}

struct Slot {
    text: String,
    translation: String,
    version: u64,
    last_update: Instant,
    last_emitted: Option<(String, String)>,
    last_activity: Instant,
    metrics: SlotMetrics,
}

impl Slot {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            text: String::new(),
            translation: String::new(),
            version: 0,
            last_update: now,
            last_emitted: None,
            last_activity: now,
            metrics: SlotMetrics::default(),
        }
    }

    fn has_terminal_punctuation(&self) -> bool {
        self.text
            .trim_end()
            .chars()
            .last()
            .map(|c| TERMINAL_PUNCTUATION.contains(&c))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct Emission {
    pub slot_key: String,
    pub text: String,
    pub translation: String,
    pub version: u64,
}

/// Configuration mirrors `coalesce.debounce_ms` / `coalesce.force_ms`.
pub struct CoalescerConfig {
    pub debounce_ms: u64,
    pub force_ms: u64,
    pub slot_gc_after: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            force_ms: 500,
            slot_gc_after: Duration::from_secs(5),
        }
    }
}

pub struct Coalescer {
    config: CoalescerConfig,
    slots: HashMap<String, Slot>,
}

impl Coalescer {
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            slots: HashMap::new(),
        }
    }

    /// Update a slot's pending text/translation. Returns `Some(Emission)` if
    /// the update satisfies an immediate-commit condition (terminal
    /// punctuation, `is_final`) or duplicates the last emission (suppressed,
    /// returns `None` but still records the metric).
    pub fn update(
        &mut self,
        slot_key: &str,
        text: &str,
        translation: &str,
        is_final: bool,
    ) -> Option<Emission> {
        let slot = self
            .slots
            .entry(slot_key.to_string())
            .or_insert_with(Slot::new);
        slot.metrics.total_segments += 1;
        slot.text = text.to_string();
        slot.translation = translation.to_string();
        slot.version += 1;
        slot.last_update = Instant::now();
        slot.last_activity = slot.last_update;

        let pair = (slot.text.clone(), slot.translation.clone());
        if slot.last_emitted.as_ref() == Some(&pair) {
            slot.metrics.duplicate_suppressions += 1;
            return None;
        }

        if is_final || slot.has_terminal_punctuation() {
            return Some(self.emit(slot_key));
        }

        None
    }

    /// Explicit caller-driven commit (e.g. session end).
    pub fn force_emit(&mut self, slot_key: &str) -> Option<Emission> {
        if !self.slots.contains_key(slot_key) {
            return None;
        }
        Some(self.emit(slot_key))
    }

    /// Called on a timer tick; emits any slot past its debounce or force
    /// window and returns every emission produced this tick.
    pub fn tick(&mut self) -> Vec<Emission> {
        let now = Instant::now();
        let debounce = Duration::from_millis(self.config.debounce_ms);
        let force = Duration::from_millis(self.config.force_ms);

        let due: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                let held = now.duration_since(slot.last_update);
                let pair = (slot.text.clone(), slot.translation.clone());
                slot.last_emitted.as_ref() != Some(&pair) && (held >= debounce || held >= force)
            })
            .map(|(k, _)| k.clone())
            .collect();

        due.into_iter().map(|k| self.emit(&k)).collect()
    }

    /// Drop slots idle for longer than `slot_gc_after` (default 5 s).
    pub fn garbage_collect(&mut self) {
        let now = Instant::now();
        let gc_after = self.config.slot_gc_after;
        self.slots
            .retain(|_, slot| now.duration_since(slot.last_activity) < gc_after);
    }

    pub fn metrics(&self, slot_key: &str) -> Option<SlotMetrics> {
        self.slots.get(slot_key).map(|s| s.metrics.clone())
    }

    fn emit(&mut self, slot_key: &str) -> Emission {
        let slot = self.slots.get_mut(slot_key).expect("slot exists");
        let held_ms = slot.last_update.elapsed().as_millis() as u64;
        slot.metrics.hold_ms_sum += held_ms;
        slot.metrics.hold_samples += 1;
        slot.metrics.emitted_count += 1;
        slot.last_emitted = Some((slot.text.clone(), slot.translation.clone()));

        Emission {
            slot_key: slot_key.to_string(),
            text: slot.text.clone(),
            translation: slot.translation.clone(),
            version: slot.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_punctuation_commits_immediately() {
        let mut c = Coalescer::new(CoalescerConfig::default());
        let emission = c.update("original", "こんにちは。", "", false);
        assert!(emission.is_some());
    }

    #[test]
    fn duplicate_tuple_is_suppressed() {
        let mut c = Coalescer::new(CoalescerConfig::default());
        c.update("slot", "Same text.", "translated.", true);
        let second = c.update("slot", "Same text.", "translated.", true);
        assert!(second.is_none());
        assert_eq!(c.metrics("slot").unwrap().duplicate_suppressions, 1);
    }

    #[test]
    fn is_final_commits_immediately_without_punctuation() {
        let mut c = Coalescer::new(CoalescerConfig::default());
        let emission = c.update("slot", "no punctuation here", "", true);
        assert!(emission.is_some());
    }

    #[test]
    fn non_final_non_terminal_update_waits_for_tick() {
        let mut c = Coalescer::new(CoalescerConfig::default());
        let emission = c.update("slot", "still typing", "", false);
        assert!(emission.is_none());
    }
}
