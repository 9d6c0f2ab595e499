use serde::Serialize;
use thiserror::Error;

use crate::inference::Capability;

/// All errors produced by murmur-core.
#[derive(Debug, Error)]
pub enum MurmurError {
    #[error("recognition engine `{engine}` is not installed")]
    DependencyMissing { engine: String },

    #[error("model initialization failed ({capability} model): {message}")]
    Initialization {
        capability: Capability,
        message: String,
    },

    #[error("audio file not found: {path}")]
    FileNotFound { path: String },

    #[error("audio transcription failed: {message}")]
    Transcription { message: String, detail: String },

    #[error("invalid JSON command: {0}")]
    MalformedCommand(String),

    #[error("unknown command: {0}")]
    UnknownAction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MurmurError {
    /// Wraps an opaque engine failure, keeping the full error chain as detail.
    pub fn transcription(err: &anyhow::Error) -> Self {
        MurmurError::Transcription {
            message: format!("{err:#}"),
            detail: format!("{err:?}"),
        }
    }

    /// Wire tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MurmurError::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            MurmurError::Initialization { .. } => ErrorKind::InitializationFailure,
            MurmurError::FileNotFound { .. } => ErrorKind::FileNotFound,
            MurmurError::Transcription { .. } => ErrorKind::TranscriptionFailure,
            MurmurError::MalformedCommand(_) => ErrorKind::MalformedCommand,
            MurmurError::UnknownAction(_) => ErrorKind::UnknownAction,
            MurmurError::Io(_) | MurmurError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Diagnostic trace attached to the failure response, if any.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            MurmurError::Transcription { detail, .. } => Some(detail.clone()),
            MurmurError::Io(e) => Some(format!("{e:?}")),
            MurmurError::Other(e) => Some(format!("{e:?}")),
            _ => None,
        }
    }
}

/// Error classification carried in the `type` field of failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "import_error")]
    DependencyMissing,
    #[serde(rename = "init_error")]
    InitializationFailure,
    #[serde(rename = "file_not_found")]
    FileNotFound,
    #[serde(rename = "transcription_error")]
    TranscriptionFailure,
    #[serde(rename = "malformed_command")]
    MalformedCommand,
    #[serde(rename = "unknown_action")]
    UnknownAction,
    /// Anything that escaped per-command dispatch.
    #[serde(rename = "internal_error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, MurmurError>;
