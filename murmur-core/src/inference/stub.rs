//! `StubEngine`: built-in backend that runs without any model files.
//!
//! Transcription echoes WAV metadata, segmentation runs `EnergyVad` over the
//! decoded samples and punctuation appends a closing mark. Output is
//! deterministic so the whole protocol path can be exercised end-to-end.

use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde_json::{json, Value};
use tracing::debug;

use super::{
    EngineInfo, Punctuator, RecognitionEngine, RecognitionOutput, Segmenter, SpeechSpan,
    Transcriber, TranscriptionRequest,
};
use crate::audio::read_wav;
use crate::vad::{speech_spans, EnergyVad};

/// Clips shorter than this (10 ms at 16 kHz) produce empty text.
const MIN_SAMPLES: usize = 160;

const SENTENCE_MARKS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

/// Load and call counters shared between an engine and its handles.
#[derive(Debug, Default)]
pub struct StubStats {
    pub loads: AtomicUsize,
    pub transcribe_calls: AtomicUsize,
    pub segment_calls: AtomicUsize,
    pub punctuate_calls: AtomicUsize,
}

impl StubStats {
    /// Total capability invocations (loads excluded).
    pub fn calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::Relaxed)
            + self.segment_calls.load(Ordering::Relaxed)
            + self.punctuate_calls.load(Ordering::Relaxed)
    }
}

/// Echo-style engine.
#[derive(Debug, Default)]
pub struct StubEngine {
    stats: Arc<StubStats>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for loads and capability calls.
    pub fn stats(&self) -> Arc<StubStats> {
        Arc::clone(&self.stats)
    }
}

impl RecognitionEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn detect(&self) -> Option<EngineInfo> {
        Some(EngineInfo {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        })
    }

    fn load_transcriber(&mut self) -> anyhow::Result<Box<dyn Transcriber>> {
        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(StubTranscriber {
            stats: self.stats(),
        }))
    }

    fn load_segmenter(&mut self) -> anyhow::Result<Box<dyn Segmenter>> {
        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(StubSegmenter {
            stats: self.stats(),
            vad: EnergyVad::default(),
        }))
    }

    fn load_punctuator(&mut self) -> anyhow::Result<Box<dyn Punctuator>> {
        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(StubPunctuator {
            stats: self.stats(),
        }))
    }
}

struct StubTranscriber {
    stats: Arc<StubStats>,
}

impl Transcriber for StubTranscriber {
    fn transcribe(&mut self, request: &TranscriptionRequest<'_>) -> anyhow::Result<RecognitionOutput> {
        self.stats.transcribe_calls.fetch_add(1, Ordering::Relaxed);
        let clip = read_wav(request.audio_path)?;
        if clip.samples.len() < MIN_SAMPLES {
            return Ok(RecognitionOutput::text(""));
        }

        let mut text = format!(
            "[stub: {} samples @ {} Hz]",
            clip.samples.len(),
            clip.sample_rate
        );
        if !request.hotword.is_empty() {
            text.push_str(&format!(" hotword={}", request.hotword));
        }
        Ok(RecognitionOutput::from_json(json!([
            {"text": text, "confidence": 1.0}
        ])))
    }
}

struct StubSegmenter {
    stats: Arc<StubStats>,
    vad: EnergyVad,
}

impl Segmenter for StubSegmenter {
    fn segment(&mut self, audio_path: &Path, _batch_window_secs: f64) -> anyhow::Result<Vec<SpeechSpan>> {
        self.stats.segment_calls.fetch_add(1, Ordering::Relaxed);
        let clip = read_wav(audio_path)?;
        let spans = speech_spans(&clip, &mut self.vad);
        debug!(spans = spans.len(), "stub segmentation done");
        Ok(spans)
    }
}

struct StubPunctuator {
    stats: Arc<StubStats>,
}

impl Punctuator for StubPunctuator {
    fn restore(&mut self, text: &str) -> anyhow::Result<RecognitionOutput> {
        self.stats.punctuate_calls.fetch_add(1, Ordering::Relaxed);
        let trimmed = text.trim_end();
        let restored = if trimmed.ends_with(SENTENCE_MARKS) {
            trimmed.to_string()
        } else {
            format!("{trimmed}。")
        };
        Ok(RecognitionOutput::Value(Value::String(restored)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tone(path: &Path, samples: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for i in 0..samples {
            let v = if (i / 8) % 2 == 0 { 8_000 } else { -8_000 };
            writer.write_sample(v as i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn transcription_echoes_clip_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        write_tone(&path, 16_000);

        let mut engine = StubEngine::new();
        let stats = engine.stats();
        let mut asr = engine.load_transcriber().expect("load");
        let out = asr
            .transcribe(&TranscriptionRequest {
                audio_path: &path,
                batch_window_secs: 300.0,
                hotword: "魔搭",
            })
            .expect("transcribe");

        assert_eq!(out.extract_text(), "[stub: 16000 samples @ 16000 Hz] hotword=魔搭");
        assert_eq!(out.confidence(), 1.0);
        assert_eq!(stats.loads.load(Ordering::Relaxed), 1);
        assert_eq!(stats.calls(), 1);
    }

    #[test]
    fn tiny_clip_yields_empty_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blip.wav");
        write_tone(&path, 10);

        let mut asr = StubEngine::new().load_transcriber().expect("load");
        let out = asr
            .transcribe(&TranscriptionRequest {
                audio_path: &path,
                batch_window_secs: 300.0,
                hotword: "",
            })
            .expect("transcribe");
        assert_eq!(out.extract_text(), "");
    }

    #[test]
    fn segmentation_finds_the_tone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        write_tone(&path, 8_000);

        let mut vad = StubEngine::new().load_segmenter().expect("load");
        let spans = vad.segment(&path, 300.0).expect("segment");
        assert_eq!(spans, vec![SpeechSpan { start_ms: 0, end_ms: 500 }]);
    }

    #[test]
    fn punctuation_appends_mark_once() {
        let mut punc = StubEngine::new().load_punctuator().expect("load");
        assert_eq!(punc.restore("你好世界").unwrap().extract_text(), "你好世界。");
        assert_eq!(punc.restore("done!").unwrap().extract_text(), "done!");
    }

    #[test]
    fn unreadable_audio_is_an_error() {
        let mut asr = StubEngine::new().load_transcriber().expect("load");
        let err = asr.transcribe(&TranscriptionRequest {
            audio_path: Path::new("/nonexistent/murmur.wav"),
            batch_window_secs: 300.0,
            hotword: "",
        });
        assert!(err.is_err());
    }
}
