//! Translation backend trait shared by C4 (realtime) and C9 (high-quality).
//!
//! Both tiers drive the same streaming shape; they differ in model choice,
//! concurrency limits, and prompt construction, all of which live in the
//! `llm` crate.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// One streamed translation request: system instruction plus source text.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub source_text: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// Outcome of a completed (or abandoned) translation request.
#[derive(Debug, Clone)]
pub struct TranslateResult {
    pub text: String,
    pub tentative: bool,
}

/// A backend capable of streaming a single translation's token deltas.
///
/// `translate_stream` sends incremental text onto `tx` as it becomes
/// available and resolves with the final accumulated result once the
/// provider signals completion. Dropping the receiver end is how callers
/// cancel an in-flight request; implementations must tear down the
/// underlying transport when the channel closes.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate_stream(
        &self,
        request: TranslateRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<TranslateResult>;

    fn model_name(&self) -> &str;
}
