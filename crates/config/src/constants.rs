//! Centralized constants for the pipeline.
//!
//! Values here are the defaults that back `Settings`; they exist so a
//! constant used in more than one place (e.g. the PCM16 scale factor shared
//! between `core::audio` and the coalescer's duplicate-text comparisons)
//! has one definition.

/// Audio framing constants (C1).
pub mod audio {
    /// Required input sample rate (Hz).
    pub const SAMPLE_RATE: u32 = 16_000;

    /// Frame duration the framer normalizes to (ms).
    pub const FRAME_MS: u32 = 20;

    /// Samples per normalized frame at 16kHz/20ms mono.
    pub const FRAME_SIZE: usize = 640;

    /// Residual buffer ceiling; anything beyond this is a framing bug, not backpressure.
    pub const MAX_RESIDUAL_MS: u32 = 40;

    /// PCM16 normalization divisor (sample as f32 / PCM16_NORMALIZE).
    pub const PCM16_NORMALIZE: f32 = 32768.0;

    /// PCM16 scaling multiplier (sample * PCM16_SCALE as i16).
    pub const PCM16_SCALE: f32 = 32767.0;
}

/// Timeouts and retry budgets for the two external streaming services.
pub mod timeouts {
    /// ASR reconnect backoff: initial delay (ms).
    pub const ASR_RECONNECT_INITIAL_MS: u64 = 250;

    /// ASR reconnect backoff: cap (ms).
    pub const ASR_RECONNECT_CAP_MS: u64 = 8_000;

    /// Max reconnect attempts within the rolling window below.
    pub const ASR_RECONNECT_MAX_ATTEMPTS: u32 = 5;

    /// Rolling window the attempt budget applies to (ms).
    pub const ASR_RECONNECT_WINDOW_MS: u64 = 60_000;

    /// Audio buffered during an ASR reconnect before oldest-first drop (ms).
    pub const ASR_RECONNECT_BUFFER_MS: u64 = 2_000;

    /// C4 soft first-token deadline (ms); past this, emit `stats{slow_first_paint}`.
    pub const REALTIME_FIRST_TOKEN_SOFT_MS: u64 = 1_000;

    /// C4 hard per-job deadline (ms).
    pub const REALTIME_HARD_TIMEOUT_MS: u64 = 5_000;

    /// C4 transport-error retry delay (ms).
    pub const REALTIME_RETRY_DELAY_MS: u64 = 250;

    /// Drain window observed by `stop()` before closing the ASR socket (ms).
    pub const STOP_DRAIN_MS: u64 = 1_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_matches_20ms_at_16khz() {
        assert_eq!(
            audio::FRAME_SIZE,
            (audio::SAMPLE_RATE as usize * audio::FRAME_MS as usize) / 1000
        );
    }
}
