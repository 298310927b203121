//! Display Pair and the three-line window (C6) it lives in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position in the three-line window. Opacity is fixed per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Oldest,
    Older,
    Recent,
}

impl Position {
    pub fn opacity(self) -> f32 {
        match self {
            Position::Oldest => 0.3,
            Position::Older => 0.6,
            Position::Recent => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayPair {
    pub pair_id: String,
    pub source_text: String,
    pub translation_text: String,
    pub position: Position,
    pub opacity: f32,
    pub created_at: DateTime<Utc>,
    pub promoted_at: Option<DateTime<Utc>>,
}

impl DisplayPair {
    pub fn new(pair_id: impl Into<String>, position: Position) -> Self {
        Self {
            pair_id: pair_id.into(),
            source_text: String::new(),
            translation_text: String::new(),
            opacity: position.opacity(),
            position,
            created_at: Utc::now(),
            promoted_at: None,
        }
    }
}
