//! Request pipeline: validates a transcription request and drives the engine
//! stages in order.
//!
//! ```text
//! file check ─► lazy initialize ─► merge options
//!     ─► segmentation (advisory) ─► transcription ─► punctuation (degradable)
//!     ─► duration probe (degradable) ─► Transcript
//! ```
//!
//! Transcription failures fail the request. Punctuation and duration probing
//! never do: they fall back to the unpunctuated text and `0.0` respectively.

use std::fs::File;
use std::path::Path;

use tracing::{debug, info, warn};

use super::{EngineConfig, InitOutcome, ModelLifecycle, ServerState};
use crate::{
    audio::probe_duration,
    error::{MurmurError, Result},
    inference::{RecognitionEngine, TranscriptionRequest},
    ipc::{OptionOverrides, TranscribeOptions},
};

/// Characters of recognised text included in log lines.
const LOG_PREVIEW_CHARS: usize = 100;

/// Successful transcription result.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Final text (punctuated when punctuation ran).
    pub text: String,
    /// Text exactly as the transcription stage produced it.
    pub raw_text: String,
    pub confidence: f64,
    pub duration_secs: f64,
    /// Output locale tag.
    pub language: String,
}

/// Which capability handles are loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub transcription: bool,
    pub segmentation: bool,
    pub punctuation: bool,
}

/// Snapshot answered by the `status` command.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub installed: bool,
    pub initialized: bool,
    pub state: ServerState,
    /// Engine version, or `"unknown"`.
    pub version: String,
    pub capabilities: CapabilityFlags,
}

/// Owns the model lifecycle and serves requests against it.
#[derive(Debug)]
pub struct TranscriptionPipeline {
    lifecycle: ModelLifecycle,
    defaults: TranscribeOptions,
    output_locale: String,
}

impl TranscriptionPipeline {
    pub fn new(config: EngineConfig, engine: Box<dyn RecognitionEngine>) -> Self {
        let defaults = TranscribeOptions::defaults_for(config.punctuation_mode)
            .merged(&config.default_options);
        Self {
            lifecycle: ModelLifecycle::new(engine, config.punctuation_mode),
            defaults,
            output_locale: config.output_locale,
        }
    }

    pub fn initialize(&mut self) -> Result<InitOutcome> {
        self.lifecycle.initialize()
    }

    pub fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }

    /// Options a request with no overrides would run with.
    pub fn defaults(&self) -> &TranscribeOptions {
        &self.defaults
    }

    /// Transcribe one audio file.
    ///
    /// # Errors
    /// - `MurmurError::FileNotFound` if the path is missing or unreadable
    ///   (checked before the engine is touched).
    /// - Initialization errors, verbatim, if lazy initialization fails.
    /// - `MurmurError::Transcription` if segmentation or transcription fails.
    pub fn transcribe(
        &mut self,
        audio_path: Option<&str>,
        overrides: Option<&OptionOverrides>,
    ) -> Result<Transcript> {
        let path = check_audio_file(audio_path)?;

        if !self.lifecycle.is_ready() {
            self.lifecycle.initialize()?;
        }

        let options = match overrides {
            Some(o) => self.defaults.merged(o),
            None => self.defaults.clone(),
        };
        info!(
            audio = %path.display(),
            language = %options.language,
            "transcription started"
        );

        let handles = self.lifecycle.handles_mut();

        if options.use_segmentation {
            if let Some(segmenter) = handles.segmenter.as_mut() {
                // Output is advisory: it does not gate or trim transcription.
                let spans = segmenter
                    .segment(path, options.batch_window_secs)
                    .map_err(|e| MurmurError::transcription(&e))?;
                debug!(spans = spans.len(), "segmentation done");
            }
        }

        let transcriber = handles.transcriber.as_mut().ok_or_else(|| {
            MurmurError::transcription(&anyhow::anyhow!("transcription model is not loaded"))
        })?;
        let output = transcriber
            .transcribe(&TranscriptionRequest {
                audio_path: path,
                batch_window_secs: options.batch_window_secs,
                hotword: &options.hotword,
            })
            .map_err(|e| {
                warn!("transcription failed: {e:#}");
                MurmurError::transcription(&e)
            })?;

        let raw_text = output.extract_text();
        let confidence = output.confidence();
        info!(text = %preview(&raw_text), "transcription done");

        let mut text = raw_text.clone();
        if options.use_punctuation && !raw_text.trim().is_empty() {
            if let Some(punctuator) = handles.punctuator.as_mut() {
                match punctuator.restore(&raw_text) {
                    Ok(restored) => {
                        if let Some(punctuated) = restored.punctuated_text() {
                            text = punctuated;
                        }
                        debug!("punctuation restored");
                    }
                    Err(e) => warn!("punctuation restoration failed, keeping raw text: {e:#}"),
                }
            }
        }

        let duration_secs = probe_duration(path).unwrap_or_else(|e| {
            debug!("duration probe failed: {e}");
            0.0
        });

        info!(text = %preview(&text), duration_secs, "transcription complete");
        Ok(Transcript {
            text,
            raw_text,
            confidence,
            duration_secs,
            language: self.output_locale.clone(),
        })
    }

    /// Engine and capability status. Never fails.
    pub fn status(&self) -> StatusReport {
        let handles = self.lifecycle.handles();
        let capabilities = CapabilityFlags {
            transcription: handles.transcriber.is_some(),
            segmentation: handles.segmenter.is_some(),
            punctuation: handles.punctuator.is_some(),
        };

        match self.lifecycle.engine_info() {
            Some(info) => StatusReport {
                installed: true,
                initialized: self.lifecycle.is_ready(),
                state: self.lifecycle.state(),
                version: info.version.unwrap_or_else(|| "unknown".into()),
                capabilities,
            },
            None => StatusReport {
                installed: false,
                initialized: false,
                state: self.lifecycle.state(),
                version: "unknown".into(),
                capabilities: CapabilityFlags::default(),
            },
        }
    }
}

fn check_audio_file(audio_path: Option<&str>) -> Result<&Path> {
    let raw = audio_path.ok_or_else(|| MurmurError::FileNotFound {
        path: "<missing audio_path>".into(),
    })?;
    let path = Path::new(raw);
    if !path.is_file() || File::open(path).is_err() {
        return Err(MurmurError::FileNotFound { path: raw.into() });
    }
    Ok(path)
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}
