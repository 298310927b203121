//! The Unified Event envelope published by every component via the event bus (C12).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the payload carried by a `UnifiedEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Partial,
    Final,
    UtteranceEnd,
    TranslationUpdate,
    TranslationComplete,
    DisplayUpdate,
    Summary,
    Vocabulary,
    FinalReport,
    Error,
    Stats,
    Status,
}

/// A single envelope on the `univoice:event` stream.
///
/// `seq` is assigned by the single-writer sequencer in C12 and is strictly
/// increasing within a session; consumers may drop anything with
/// `seq <= last_seen`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedEvent {
    pub v: u8,
    pub id: Uuid,
    pub seq: u64,
    pub ts: DateTime<Utc>,
    pub corr: Uuid,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl UnifiedEvent {
    /// Construct an event payload; `seq` is filled in by the sequencer at
    /// publish time, so this takes a placeholder of 0.
    pub fn new(corr: Uuid, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            v: 1,
            id: Uuid::new_v4(),
            seq: 0,
            ts: Utc::now(),
            corr,
            kind,
            payload,
        }
    }
}
