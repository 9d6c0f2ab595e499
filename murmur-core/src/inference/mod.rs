//! Recognition engine abstraction.
//!
//! A `RecognitionEngine` is the loader for three independent capabilities:
//! endpoint segmentation, speech-to-text transcription and punctuation
//! restoration. Loading is the expensive part; `ModelLifecycle` guarantees each
//! loader runs at most once per process.
//!
//! Capability calls take `&mut self` because decoders are stateful. The server
//! is single-threaded, so handles are plain boxes owned by the lifecycle rather
//! than shared behind locks.

pub mod output;
pub mod registry;
pub mod stub;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use output::{Alternative, RecognitionOutput};
pub use registry::{resolve_engine, UnavailableEngine};
pub use stub::{StubEngine, StubStats};

/// The three loadable model capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Transcription,
    Segmentation,
    Punctuation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Transcription => "transcription",
            Capability::Segmentation => "segmentation",
            Capability::Punctuation => "punctuation",
        })
    }
}

/// What an installed engine reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineInfo {
    /// Library version, if the engine exposes one.
    pub version: Option<String>,
}

/// Arguments for a single transcription call.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptionRequest<'a> {
    pub audio_path: &'a Path,
    /// Maximum audio duration per internal engine batch, in seconds.
    pub batch_window_secs: f64,
    /// Recognition-biasing term; empty means none.
    pub hotword: &'a str,
}

/// A speech-active time span, in milliseconds from the start of the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Speech-to-text capability.
pub trait Transcriber: Send {
    /// Recognise the audio file referenced by `request`.
    ///
    /// The result shape is engine-defined; see [`RecognitionOutput`].
    fn transcribe(&mut self, request: &TranscriptionRequest<'_>) -> anyhow::Result<RecognitionOutput>;
}

/// Endpoint segmentation capability.
pub trait Segmenter: Send {
    fn segment(&mut self, audio_path: &Path, batch_window_secs: f64) -> anyhow::Result<Vec<SpeechSpan>>;
}

/// Punctuation restoration capability.
pub trait Punctuator: Send {
    fn restore(&mut self, text: &str) -> anyhow::Result<RecognitionOutput>;
}

/// Contract for recognition backends.
pub trait RecognitionEngine: Send {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Locate the engine library. `None` means it is not installed.
    ///
    /// Must be cheap and must not load any model.
    fn detect(&self) -> Option<EngineInfo>;

    /// Load the transcription model.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt.
    fn load_transcriber(&mut self) -> anyhow::Result<Box<dyn Transcriber>>;

    /// Load the segmentation model.
    fn load_segmenter(&mut self) -> anyhow::Result<Box<dyn Segmenter>>;

    /// Load the punctuation model.
    fn load_punctuator(&mut self) -> anyhow::Result<Box<dyn Punctuator>>;
}
