//! C1: Audio Framer.
//!
//! Accepts frames of arbitrary size, re-frames into exact 20 ms / 640-sample
//! / 16 kHz mono units. Keeps at most `MAX_RESIDUAL_MS` of unconsumed audio
//! between calls. Drops silent-only frames under backpressure; malformed
//! frames (odd byte count) are reported, never panic.

use voice_agent_config::constants::audio as audio_const;
use voice_agent_core::{AudioFrame, Channels, Error, Result, SampleRate};

/// Frames raw PCM16 bytes into exact 20 ms units, carrying residual samples
/// (< 40 ms) across calls.
pub struct AudioFramer {
    residual: Vec<f32>,
    sequence: u64,
    backpressure: bool,
}

impl Default for AudioFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFramer {
    pub fn new() -> Self {
        Self {
            residual: Vec::with_capacity(audio_const::FRAME_SIZE),
            sequence: 0,
            backpressure: false,
        }
    }

    /// Set by the caller when the ASR socket buffer exceeds 1 s of audio
    /// (§5 backpressure). While set, silence-only frames are dropped instead
    /// of forwarded.
    pub fn set_backpressure(&mut self, on: bool) {
        self.backpressure = on;
    }

    /// Accept raw little-endian PCM16 bytes and return zero or more exactly
    /// 640-sample frames. Malformed input (odd byte count) is reported and
    /// discarded rather than causing a partial frame.
    pub fn push_pcm16(&mut self, bytes: &[u8]) -> Result<Vec<AudioFrame>> {
        if bytes.len() % 2 != 0 {
            return Err(Error::Protocol(
                "malformed audio frame: odd byte count for PCM16".to_string(),
            ));
        }

        let incoming: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / audio_const::PCM16_NORMALIZE)
            .collect();
        self.residual.extend(incoming);

        let mut frames = Vec::new();
        while self.residual.len() >= audio_const::FRAME_SIZE {
            let chunk: Vec<f32> = self.residual.drain(..audio_const::FRAME_SIZE).collect();
            let frame = AudioFrame::new(chunk, SampleRate::Hz16000, Channels::Mono, self.sequence);
            self.sequence += 1;

            if self.backpressure && frame.is_likely_silence(-50.0) {
                continue;
            }
            frames.push(frame);
        }

        debug_assert!(
            (self.residual.len() as u32 * 1000) / audio_const::SAMPLE_RATE
                < audio_const::MAX_RESIDUAL_MS
        );

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm16_silence(samples: usize) -> Vec<u8> {
        vec![0u8; samples * 2]
    }

    #[test]
    fn emits_exact_640_sample_frames() {
        let mut framer = AudioFramer::new();
        let frames = framer.push_pcm16(&pcm16_silence(640)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples.len(), audio_const::FRAME_SIZE);
    }

    #[test]
    fn carries_residual_across_calls() {
        let mut framer = AudioFramer::new();
        assert!(framer.push_pcm16(&pcm16_silence(400)).unwrap().is_empty());
        let frames = framer.push_pcm16(&pcm16_silence(240)).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn odd_byte_count_is_reported_not_panicked() {
        let mut framer = AudioFramer::new();
        let err = framer.push_pcm16(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn drops_silence_under_backpressure() {
        let mut framer = AudioFramer::new();
        framer.set_backpressure(true);
        let frames = framer.push_pcm16(&pcm16_silence(640)).unwrap();
        assert!(frames.is_empty());
    }
}
