//! Core traits for the streaming pipeline.
//!
//! # Trait Hierarchy
//!
//! ```text
//! ASR:
//!   - AsrAdapter: streaming connection to the ASR provider (C2)
//!
//! Translation:
//!   - TranslationBackend: streaming translation, shared by C4 and C9
//! ```

mod asr;
mod translate;

pub use asr::{AsrAdapter, AsrConnectionState};
pub use translate::{TranslateRequest, TranslateResult, TranslationBackend};
