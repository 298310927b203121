//! Summary: a periodic progressive summary produced by C10.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub source_text: String,
    pub translated_text: String,
    pub covers_start_ts: f64,
    pub covers_end_ts: f64,
    pub word_count: usize,
}
