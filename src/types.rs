//! Core value types shared across the assessment pipeline.

use serde::Serialize;

/// Finalized capture output: mono or interleaved signed 16-bit PCM.
///
/// Owned exclusively by the capture session until finalized; every stage
/// after capture treats it as read-only.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Builds a buffer from normalized f32 samples, clamping into i16 range.
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let converted = samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect();
        Self::mono(converted, sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Downmixes to normalized mono f32 samples in [-1.0, 1.0].
    pub fn to_mono_f32(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        self.samples
            .chunks(channels)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|&s| s as f32 / i16::MAX as f32).sum();
                sum / frame.len() as f32
            })
            .collect()
    }
}

/// Word-level timing inside an utterance, in seconds from buffer start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTiming {
    pub word: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start_secs: f64, end_secs: f64) -> Self {
        Self {
            word: word.into(),
            start_secs,
            end_secs,
        }
    }
}

/// Output of the external speech-to-text collaborator.
#[derive(Debug, Clone, Default)]
pub struct Transcription {
    pub text: String,
    pub words: Vec<WordTiming>,
}
