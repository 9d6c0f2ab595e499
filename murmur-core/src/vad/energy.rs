//! RMS energy detector used by the stub segmenter.
//!
//! A frame is speech when its RMS level reaches `threshold`. After the last
//! loud frame, `hangover` more frames are still reported as speech so short
//! pauses inside a word do not split a span.

use super::{VadDecision, VoiceActivityDetector, FRAME_MS};

/// Default RMS threshold for normalised `f32` samples.
pub const DEFAULT_THRESHOLD: f32 = 0.02;
/// Default hangover, in milliseconds.
pub const DEFAULT_HANGOVER_MS: u64 = 160;

#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold: f32,
    hangover: u32,
    remaining: u32,
}

impl EnergyVad {
    /// `hangover_ms` is rounded down to whole `FRAME_MS` frames.
    pub fn new(threshold: f32, hangover_ms: u64) -> Self {
        Self {
            threshold: threshold.max(0.0),
            hangover: u32::try_from(hangover_ms / FRAME_MS).unwrap_or(u32::MAX),
            remaining: 0,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn is_loud(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        // Compare mean square against threshold² instead of taking a root.
        let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        mean_sq >= self.threshold * self.threshold
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_HANGOVER_MS)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn classify(&mut self, frame: &[f32]) -> VadDecision {
        if self.is_loud(frame) {
            self.remaining = self.hangover;
            return VadDecision::Speech;
        }
        match self.remaining.checked_sub(1) {
            Some(left) => {
                self.remaining = left;
                VadDecision::Speech
            }
            None => VadDecision::Silence,
        }
    }

    fn reset(&mut self) {
        self.remaining = 0;
    }
}
