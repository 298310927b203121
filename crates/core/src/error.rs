//! Error taxonomy shared across the pipeline crates.

use thiserror::Error;

/// Convenience alias used throughout the core and pipeline crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the streaming pipeline.
///
/// Mirrors the categories a component is allowed to raise: transport and
/// protocol failures from external services, job-level timeouts, resource
/// backpressure, invalid configuration, invalid state transitions, and
/// non-2xx/explicit provider failures.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Network/socket failure talking to the ASR or LLM provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider sent a message that didn't parse as expected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A job exceeded its deadline.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// A bounded queue/buffer dropped work under pressure.
    #[error("backpressure drop: {0}")]
    BackpressureDrop(String),

    /// Invalid configuration supplied at start.
    #[error("config error: {0}")]
    Config(String),

    /// Command is not valid for the pipeline's current state.
    #[error("state error: {0}")]
    State(String),

    /// Remote provider returned a non-2xx or explicit failure payload.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error bubbled up from the LLM crate.
    #[error("llm error: {0}")]
    Llm(String),
}

impl Error {
    /// Whether this error represents a condition the pipeline can recover
    /// from locally (retry, reconnect) versus one that should move the
    /// pipeline to `Error` state.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout(_) | Error::BackpressureDrop(_)
        )
    }
}
