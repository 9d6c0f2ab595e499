//! `ModelLifecycle`: owns the engine capability handles.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──initialize()──► Initializing ──► Ready
//!                                      │
//!                                      └──► Failed ──initialize()──► Initializing …
//! ```
//!
//! Load order is fixed: transcription, segmentation, punctuation. The first
//! load failure aborts the remaining loads. A retry after `Failed` skips the
//! capabilities that already loaded, so every loader runs at most once per
//! process. `Ready` is never left.
//!
//! ## Threading
//!
//! The lifecycle is driven from the single protocol thread. `Initializing` is
//! only observable from inside `initialize()`; there are no concurrent callers.

pub mod pipeline;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    error::{MurmurError, Result},
    inference::{Capability, EngineInfo, Punctuator, RecognitionEngine, Segmenter, Transcriber},
    ipc::OptionOverrides,
};

/// Where punctuation restoration happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunctuationMode {
    /// The engine's punctuation model is loaded and used by default.
    #[default]
    Engine,
    /// A downstream consumer punctuates; no model is loaded.
    External,
    /// No punctuation anywhere.
    Disabled,
}

impl PunctuationMode {
    pub fn loads_model(self) -> bool {
        self == PunctuationMode::Engine
    }
}

impl FromStr for PunctuationMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "engine" | "builtin" => Ok(PunctuationMode::Engine),
            "external" | "delegated" => Ok(PunctuationMode::External),
            "disabled" | "off" | "none" => Ok(PunctuationMode::Disabled),
            other => Err(format!("unknown punctuation mode: {other}")),
        }
    }
}

/// Configuration for the lifecycle and request pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether the punctuation model is loaded. Also picks the `use_punc`
    /// default. Default: `Engine`.
    pub punctuation_mode: PunctuationMode,
    /// Deployment-level option defaults, applied before per-request options.
    pub default_options: OptionOverrides,
    /// Locale tag reported in every transcript. Default: `"zh-CN"`.
    pub output_locale: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            punctuation_mode: PunctuationMode::Engine,
            default_options: OptionOverrides::default(),
            output_locale: "zh-CN".into(),
        }
    }
}

/// Initialization state of the capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Uninitialized,
    Initializing,
    Ready,
    /// Last attempt failed; the next `initialize()` retries.
    Failed,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerState::Uninitialized => "uninitialized",
            ServerState::Initializing => "initializing",
            ServerState::Ready => "ready",
            ServerState::Failed => "failed",
        })
    }
}

/// Loaded capabilities. Each is independently present or absent.
#[derive(Default)]
pub struct EngineHandles {
    pub transcriber: Option<Box<dyn Transcriber>>,
    pub segmenter: Option<Box<dyn Segmenter>>,
    pub punctuator: Option<Box<dyn Punctuator>>,
}

impl fmt::Debug for EngineHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandles")
            .field("transcriber", &self.transcriber.is_some())
            .field("segmenter", &self.segmenter.is_some())
            .field("punctuator", &self.punctuator.is_some())
            .finish()
    }
}

/// Result of a successful `initialize()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Models were loaded by this call.
    Loaded,
    /// State was already `Ready`; the engine was not touched.
    AlreadyReady,
}

pub struct ModelLifecycle {
    engine: Box<dyn RecognitionEngine>,
    punctuation_mode: PunctuationMode,
    state: ServerState,
    handles: EngineHandles,
}

impl ModelLifecycle {
    pub fn new(engine: Box<dyn RecognitionEngine>, punctuation_mode: PunctuationMode) -> Self {
        Self {
            engine,
            punctuation_mode,
            state: ServerState::Uninitialized,
            handles: EngineHandles::default(),
        }
    }

    /// Load every configured capability. Idempotent once `Ready`.
    ///
    /// # Errors
    /// - `MurmurError::DependencyMissing` if the engine library is absent.
    /// - `MurmurError::Initialization` if a model failed to load.
    pub fn initialize(&mut self) -> Result<InitOutcome> {
        if self.state == ServerState::Ready {
            return Ok(InitOutcome::AlreadyReady);
        }

        self.state = ServerState::Initializing;
        info!(engine = self.engine.name(), "initializing models");

        match self.load_all() {
            Ok(()) => {
                self.state = ServerState::Ready;
                info!("all models ready");
                Ok(InitOutcome::Loaded)
            }
            Err(e) => {
                self.state = ServerState::Failed;
                error!("{e}");
                Err(e)
            }
        }
    }

    fn load_all(&mut self) -> Result<()> {
        if self.engine.detect().is_none() {
            return Err(MurmurError::DependencyMissing {
                engine: self.engine.name().to_string(),
            });
        }

        if self.handles.transcriber.is_none() {
            let handle = self
                .engine
                .load_transcriber()
                .map_err(|e| load_error(Capability::Transcription, &e))?;
            self.handles.transcriber = Some(handle);
            info!("transcription model ready");
        }

        if self.handles.segmenter.is_none() {
            let handle = self
                .engine
                .load_segmenter()
                .map_err(|e| load_error(Capability::Segmentation, &e))?;
            self.handles.segmenter = Some(handle);
            info!("segmentation model ready");
        }

        match self.punctuation_mode {
            PunctuationMode::Engine if self.handles.punctuator.is_none() => {
                let handle = self
                    .engine
                    .load_punctuator()
                    .map_err(|e| load_error(Capability::Punctuation, &e))?;
                self.handles.punctuator = Some(handle);
                info!("punctuation model ready");
            }
            PunctuationMode::Engine => {}
            PunctuationMode::External => info!("punctuation delegated to the caller; model not loaded"),
            PunctuationMode::Disabled => info!("punctuation disabled; model not loaded"),
        }
        Ok(())
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ServerState::Ready
    }

    pub fn punctuation_mode(&self) -> PunctuationMode {
        self.punctuation_mode
    }

    pub fn handles(&self) -> &EngineHandles {
        &self.handles
    }

    pub fn handles_mut(&mut self) -> &mut EngineHandles {
        &mut self.handles
    }

    /// Probe the engine library without loading anything.
    pub fn engine_info(&self) -> Option<EngineInfo> {
        self.engine.detect()
    }
}

impl fmt::Debug for ModelLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLifecycle")
            .field("engine", &self.engine.name())
            .field("punctuation_mode", &self.punctuation_mode)
            .field("state", &self.state)
            .field("handles", &self.handles)
            .finish()
    }
}

fn load_error(capability: Capability, err: &anyhow::Error) -> MurmurError {
    MurmurError::Initialization {
        capability,
        message: format!("{err:#}"),
    }
}
