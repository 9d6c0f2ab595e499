//! # murmur-core
//!
//! Keeps speech models resident in one long-lived process and serves
//! transcription requests over line-delimited JSON.
//!
//! ## Architecture
//!
//! ```text
//! stdin ─► Server (protocol loop) ─► TranscriptionPipeline ─► ModelLifecycle
//!   ▲            │                          │                      │
//!   │     ShutdownFlag                 engine stages          RecognitionEngine
//!   │                                       │               (segment / transcribe
//! stdout ◄── one JSON line per command ◄────┘                 / punctuate)
//! ```
//!
//! Everything runs on one thread. Requests are served strictly in arrival
//! order, so engine handles need no locking.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod engine;
pub mod error;
pub mod inference;
pub mod ipc;
pub mod server;
pub mod shutdown;
pub mod vad;

// Convenience re-exports for downstream crates
pub use engine::pipeline::{StatusReport, Transcript, TranscriptionPipeline};
pub use engine::{EngineConfig, ModelLifecycle, PunctuationMode, ServerState};
pub use error::{ErrorKind, MurmurError};
pub use inference::{resolve_engine, RecognitionEngine, RecognitionOutput};
pub use ipc::{Command, OptionOverrides, Response};
pub use server::{Server, StopReason};
pub use shutdown::ShutdownFlag;
