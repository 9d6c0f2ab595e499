//! Outgoing responses: `{"success": bool, ...body}` on a single line.

use serde::Serialize;

use crate::engine::pipeline::{StatusReport, Transcript};
use crate::engine::ServerState;
use crate::error::{ErrorKind, MurmurError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Transcript(TranscriptBody),
    Status(StatusBody),
    Message {
        message: String,
    },
    Failure {
        error: String,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        kind: Option<ErrorKind>,
        #[serde(skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptBody {
    pub text: String,
    pub raw_text: String,
    pub confidence: f64,
    /// Audio duration in seconds.
    pub duration: f64,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBody {
    pub installed: bool,
    pub initialized: bool,
    pub state: ServerState,
    pub version: String,
    pub models: ModelFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelFlags {
    pub asr: bool,
    pub vad: bool,
    pub punc: bool,
}

impl Response {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            body: ResponseBody::Message {
                message: message.into(),
            },
        }
    }

    pub fn transcript(transcript: Transcript) -> Self {
        Self {
            success: true,
            body: ResponseBody::Transcript(TranscriptBody {
                text: transcript.text,
                raw_text: transcript.raw_text,
                confidence: transcript.confidence,
                duration: transcript.duration_secs,
                language: transcript.language,
            }),
        }
    }

    pub fn status(report: &StatusReport) -> Self {
        Self {
            success: true,
            body: ResponseBody::Status(StatusBody {
                installed: report.installed,
                initialized: report.initialized,
                state: report.state,
                version: report.version.clone(),
                models: ModelFlags {
                    asr: report.capabilities.transcription,
                    vad: report.capabilities.segmentation,
                    punc: report.capabilities.punctuation,
                },
            }),
        }
    }

    pub fn failure(err: &MurmurError) -> Self {
        Self {
            success: false,
            body: ResponseBody::Failure {
                error: err.to_string(),
                kind: Some(err.kind()),
                traceback: err.diagnostic(),
            },
        }
    }

    /// Catch-all for failures that escaped per-command dispatch.
    pub fn internal(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            success: false,
            body: ResponseBody::Failure {
                error: message.into(),
                kind: Some(ErrorKind::Internal),
                traceback: Some(traceback.into()),
            },
        }
    }

    /// Serialise to one line of JSON (no trailing newline).
    ///
    /// `serde_json` escapes control characters, so the output never contains
    /// an embedded newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
