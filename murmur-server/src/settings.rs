//! Server settings: a JSON file, then environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use murmur_core::{EngineConfig, OptionOverrides, PunctuationMode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENGINE: &str = "stub";
pub const DEFAULT_OUTPUT_LOCALE: &str = "zh-CN";
pub const DEFAULT_LOG_FILTER: &str = "murmur=info";

pub const ENV_ENGINE: &str = "MURMUR_ENGINE";
pub const ENV_PUNCTUATION_MODE: &str = "MURMUR_PUNCTUATION_MODE";
pub const ENV_OUTPUT_LOCALE: &str = "MURMUR_OUTPUT_LOCALE";
pub const ENV_USER_DATA: &str = "MURMUR_USER_DATA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Recognition engine name, resolved through the engine registry.
    pub engine: String,
    pub punctuation_mode: PunctuationMode,
    pub output_locale: String,
    /// Applied to every request before its own options.
    pub default_options: OptionOverrides,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            engine: DEFAULT_ENGINE.into(),
            punctuation_mode: PunctuationMode::Engine,
            output_locale: DEFAULT_OUTPUT_LOCALE.into(),
            default_options: OptionOverrides::default(),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl ServerSettings {
    pub fn normalize(&mut self) {
        self.engine = non_empty_or(&self.engine.to_ascii_lowercase(), DEFAULT_ENGINE);
        self.output_locale = non_empty_or(&self.output_locale, DEFAULT_OUTPUT_LOCALE);
        self.log_filter = non_empty_or(&self.log_filter, DEFAULT_LOG_FILTER);
        if let Some(hotword) = self.default_options.hotword.as_mut() {
            *hotword = hotword.trim().to_string();
        }
    }

    /// Apply `MURMUR_*` overrides read through `lookup`.
    ///
    /// Returns a warning for every value that could not be applied.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        if let Some(engine) = lookup(ENV_ENGINE) {
            self.engine = engine;
        }
        if let Some(raw) = lookup(ENV_PUNCTUATION_MODE) {
            match raw.parse::<PunctuationMode>() {
                Ok(mode) => self.punctuation_mode = mode,
                Err(e) => warnings.push(format!("{ENV_PUNCTUATION_MODE}: {e}")),
            }
        }
        if let Some(locale) = lookup(ENV_OUTPUT_LOCALE) {
            self.output_locale = locale;
        }
        warnings
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            punctuation_mode: self.punctuation_mode,
            default_options: self.default_options.clone(),
            output_locale: self.output_locale.clone(),
        }
    }
}

fn non_empty_or(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.into()
    } else {
        trimmed.into()
    }
}

/// Read and normalize a settings file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a settings object.
pub fn read_settings(path: &Path) -> anyhow::Result<ServerSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read settings file {}", path.display()))?;
    let mut settings: ServerSettings = serde_json::from_str(&raw)
        .with_context(|| format!("invalid settings file {}", path.display()))?;
    settings.normalize();
    Ok(settings)
}

/// Directory for the durable log file.
pub fn log_dir(user_data: Option<PathBuf>) -> PathBuf {
    match user_data {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join("logs"),
        _ => std::env::temp_dir().join("murmur_logs"),
    }
}
