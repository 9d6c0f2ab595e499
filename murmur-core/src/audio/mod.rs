//! WAV access for the built-in engine and duration probing.
//!
//! Only the header is read when probing; full decoding happens in
//! [`read_wav`] and downmixes to mono f32.

use std::path::Path;

use crate::error::{MurmurError, Result};

/// A contiguous block of mono PCM samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this clip in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a WAV file into a mono f32 clip.
///
/// Integer formats are normalised by their full-scale value; multi-channel
/// frames are averaged.
pub fn read_wav(path: &Path) -> Result<AudioClip> {
    let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let max = ((1_i64 << spec.bits_per_sample.saturating_sub(1)) - 1).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(wav_error)?
        }
    };

    if channels == 1 {
        return Ok(AudioClip::new(interleaved, spec.sample_rate));
    }

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().copied().sum::<f32>() / channels as f32)
        .collect();
    Ok(AudioClip::new(mono, spec.sample_rate))
}

/// Duration of a WAV file in seconds, from its header.
pub fn probe_duration(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(wav_error)?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return Err(MurmurError::Other(anyhow::anyhow!(
            "WAV header declares a zero sample rate"
        )));
    }
    Ok(f64::from(reader.duration()) / f64::from(sample_rate))
}

fn wav_error(err: hound::Error) -> MurmurError {
    match err {
        hound::Error::IoError(e) => MurmurError::Io(e),
        other => MurmurError::Other(anyhow::Error::new(other).context("WAV decode")),
    }
}
