//! Voice Activity Detection (VAD) used by the built-in segmenter.
//!
//! `speech_spans` frames a clip into fixed windows, classifies each with a
//! `VoiceActivityDetector` and merges consecutive speech frames into spans.

pub mod energy;

pub use energy::EnergyVad;

use crate::audio::AudioClip;
use crate::inference::SpeechSpan;

/// Frame stride used by `speech_spans` (20 ms).
pub const FRAME_MS: u64 = 20;

/// Whether a given audio frame contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    /// The frame contains speech energy above threshold.
    Speech,
    /// The frame is silent (or below threshold, including hangover period).
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Trait for all VAD implementations.
///
/// Implementors may be stateful (hangover counters, RNN hidden states, etc.).
pub trait VoiceActivityDetector: Send + 'static {
    /// Analyse one frame of mono samples.
    fn classify(&mut self, frame: &[f32]) -> VadDecision;

    /// Reset any internal state (e.g. hangover counters, hidden states).
    fn reset(&mut self);
}

/// Speech-active spans of `clip`, in milliseconds.
pub fn speech_spans(clip: &AudioClip, vad: &mut dyn VoiceActivityDetector) -> Vec<SpeechSpan> {
    vad.reset();
    let frame_len = (clip.sample_rate as u64 * FRAME_MS / 1000).max(1) as usize;
    let total_ms = (clip.duration_secs() * 1000.0).round() as u64;

    let mut spans = Vec::new();
    let mut open: Option<u64> = None;

    for (idx, frame) in clip.samples.chunks(frame_len).enumerate() {
        let start_ms = idx as u64 * FRAME_MS;
        match (vad.classify(frame).is_speech(), open) {
            (true, None) => open = Some(start_ms),
            (false, Some(begin)) => {
                spans.push(SpeechSpan {
                    start_ms: begin,
                    end_ms: start_ms,
                });
                open = None;
            }
            _ => {}
        }
    }

    if let Some(begin) = open {
        spans.push(SpeechSpan {
            start_ms: begin,
            end_ms: total_ms.max(begin),
        });
    }
    spans
}
