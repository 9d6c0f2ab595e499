//! Incoming commands and transcription options.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::PunctuationMode;
use crate::error::{MurmurError, Result};

/// What a command asks the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Transcribe,
    Status,
    Exit,
}

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: Action,
    pub audio_path: Option<String>,
    pub options: Option<OptionOverrides>,
}

/// Wire shape before the action is validated.
#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    audio_path: Option<String>,
    #[serde(default)]
    options: Option<OptionOverrides>,
}

impl Command {
    /// Parse one protocol line.
    ///
    /// # Errors
    /// - `MurmurError::MalformedCommand` if the line is not a command object.
    /// - `MurmurError::UnknownAction` if `action` is missing or unrecognised.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line).map_err(malformed)?;
        // Structs also deserialize from sequences; only objects are commands.
        let Value::Object(fields) = value else {
            return Err(MurmurError::MalformedCommand(
                "command must be a JSON object".into(),
            ));
        };
        if let Some(options) = fields.get("options") {
            if !(options.is_object() || options.is_null()) {
                return Err(MurmurError::MalformedCommand(
                    "options must be a JSON object or null".into(),
                ));
            }
        }
        let raw: RawCommand = serde_json::from_value(Value::Object(fields)).map_err(malformed)?;

        let action = match raw.action.as_deref() {
            Some("transcribe") => Action::Transcribe,
            Some("status") => Action::Status,
            Some("exit") => Action::Exit,
            Some(other) => return Err(MurmurError::UnknownAction(other.to_string())),
            None => return Err(MurmurError::UnknownAction("<missing>".into())),
        };

        Ok(Command {
            action,
            audio_path: raw.audio_path,
            options: raw.options,
        })
    }
}

fn malformed(err: serde_json::Error) -> MurmurError {
    MurmurError::MalformedCommand(err.to_string())
}

/// Caller-supplied option overrides. Absent fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionOverrides {
    #[serde(default, rename = "batch_size_s", skip_serializing_if = "Option::is_none")]
    pub batch_window_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotword: Option<String>,
    #[serde(default, rename = "use_vad", skip_serializing_if = "Option::is_none")]
    pub use_segmentation: Option<bool>,
    #[serde(default, rename = "use_punc", skip_serializing_if = "Option::is_none")]
    pub use_punctuation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Effective options for one request. Immutable once merged.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    pub batch_window_secs: f64,
    pub hotword: String,
    pub use_segmentation: bool,
    pub use_punctuation: bool,
    pub language: String,
}

impl TranscribeOptions {
    /// Built-in defaults; `use_punctuation` follows the deployment mode.
    pub fn defaults_for(mode: PunctuationMode) -> Self {
        Self {
            batch_window_secs: 300.0,
            hotword: String::new(),
            use_segmentation: true,
            use_punctuation: mode == PunctuationMode::Engine,
            language: "zh".into(),
        }
    }

    /// Apply `overrides` field by field.
    pub fn merged(&self, overrides: &OptionOverrides) -> Self {
        Self {
            batch_window_secs: overrides.batch_window_secs.unwrap_or(self.batch_window_secs),
            hotword: overrides.hotword.clone().unwrap_or_else(|| self.hotword.clone()),
            use_segmentation: overrides.use_segmentation.unwrap_or(self.use_segmentation),
            use_punctuation: overrides.use_punctuation.unwrap_or(self.use_punctuation),
            language: overrides.language.clone().unwrap_or_else(|| self.language.clone()),
        }
    }
}
