//! Engine selection by configured name.

use anyhow::bail;
use tracing::warn;

use super::{EngineInfo, Punctuator, RecognitionEngine, Segmenter, StubEngine, Transcriber};

/// Resolve a configured engine name.
///
/// Names that are not built into this binary resolve to an
/// [`UnavailableEngine`], so the server still starts and reports the engine
/// as not installed.
pub fn resolve_engine(name: &str) -> Box<dyn RecognitionEngine> {
    match name.trim().to_ascii_lowercase().as_str() {
        "stub" | "" => Box::new(StubEngine::new()),
        other => {
            warn!(engine = other, "recognition engine is not available in this build");
            Box::new(UnavailableEngine::new(other))
        }
    }
}

/// Placeholder for an engine whose library cannot be located.
#[derive(Debug, Clone)]
pub struct UnavailableEngine {
    name: String,
}

impl UnavailableEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RecognitionEngine for UnavailableEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self) -> Option<EngineInfo> {
        None
    }

    fn load_transcriber(&mut self) -> anyhow::Result<Box<dyn Transcriber>> {
        bail!("engine `{}` is not installed", self.name)
    }

    fn load_segmenter(&mut self) -> anyhow::Result<Box<dyn Segmenter>> {
        bail!("engine `{}` is not installed", self.name)
    }

    fn load_punctuator(&mut self) -> anyhow::Result<Box<dyn Punctuator>> {
        bail!("engine `{}` is not installed", self.name)
    }
}
