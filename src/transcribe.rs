//! Speech-to-text collaborator boundary.
//!
//! Transcription failure is fatal for the grading attempt; this core does
//! not retry. The Whisper implementation follows the whisper.cpp bindings:
//! segments carry centisecond timestamps, and word timings are derived by
//! splitting each segment's span evenly across its words.

use std::path::Path;

use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::resample;
use crate::error::{AssessError, Result};
use crate::features::TARGET_SAMPLE_RATE;
use crate::text;
use crate::types::{AudioBuffer, Transcription, WordTiming};

/// Turns a finalized utterance buffer into text plus word timestamps.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Transcription>;
}

/// Whisper-backed transcriber. Expects a ggml model file on disk, e.g.
/// `ggml-base.en.bin` from the whisper.cpp model repository.
pub struct WhisperTranscriber {
    context: WhisperContext,
}

impl WhisperTranscriber {
    pub fn new(model_path: &Path) -> Result<Self> {
        let context = WhisperContext::new_with_params(
            &model_path.to_string_lossy(),
            WhisperContextParameters::default(),
        )
        .map_err(|err| {
            AssessError::Transcription(format!(
                "failed to load Whisper model at {model_path:?}: {err}"
            ))
        })?;
        info!(model = ?model_path, "whisper model loaded");
        Ok(Self { context })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Transcription> {
        let mono = audio.to_mono_f32();
        let samples = resample::to_rate(&mono, audio.sample_rate, TARGET_SAMPLE_RATE);

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let mut state = self
            .context
            .create_state()
            .map_err(|err| AssessError::Transcription(format!("state creation failed: {err}")))?;
        state
            .full(params, &samples)
            .map_err(|err| AssessError::Transcription(format!("decoding failed: {err}")))?;

        let mut transcript = String::new();
        let mut words = Vec::new();
        for segment in state.as_iter() {
            let segment_text = segment
                .to_str()
                .map_err(|err| {
                    AssessError::Transcription(format!("segment text unavailable: {err}"))
                })?
                .to_string();
            // Timestamps arrive in centiseconds.
            let start = segment.start_timestamp() as f64 / 100.0;
            let end = segment.end_timestamp() as f64 / 100.0;
            words.extend(split_segment_words(&segment_text, start, end));
            if !transcript.is_empty() {
                transcript.push(' ');
            }
            transcript.push_str(segment_text.trim());
        }
        info!(
            words = words.len(),
            duration_secs = audio.duration_secs(),
            "transcription complete"
        );
        Ok(Transcription {
            text: transcript,
            words,
        })
    }
}

/// Distributes a segment's time span evenly over its word tokens. Whisper
/// segments are phrase-level; per-word boundaries inside a segment are an
/// approximation refined later by the forced aligner when available.
fn split_segment_words(segment_text: &str, start: f64, end: f64) -> Vec<WordTiming> {
    let tokens = text::tokenize(segment_text);
    if tokens.is_empty() {
        return Vec::new();
    }
    let span = (end - start).max(0.0);
    let slice = span / tokens.len() as f64;
    tokens
        .into_iter()
        .enumerate()
        .map(|(index, word)| {
            WordTiming::new(
                word,
                start + index as f64 * slice,
                start + (index + 1) as f64 * slice,
            )
        })
        .collect()
}

/// Test double returning a fixed transcript with uniform word timings over
/// the buffer duration.
pub struct FixedTranscriber {
    text: String,
}

impl FixedTranscriber {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Transcriber for FixedTranscriber {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Transcription> {
        let words = split_segment_words(&self.text, 0.0, audio.duration_secs());
        Ok(Transcription {
            text: self.text.clone(),
            words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_words_share_the_span_evenly() {
        let words = split_segment_words("the quick fox", 1.0, 4.0);
        assert_eq!(words.len(), 3);
        assert!((words[0].start_secs - 1.0).abs() < 1e-9);
        assert!((words[1].start_secs - 2.0).abs() < 1e-9);
        assert!((words[2].end_secs - 4.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_transcriber_times_words_over_buffer() {
        let transcriber = FixedTranscriber::new("one two");
        let audio = AudioBuffer::mono(vec![0; 32_000], 16_000);
        let result = transcriber.transcribe(&audio).unwrap();
        assert_eq!(result.text, "one two");
        assert_eq!(result.words.len(), 2);
        assert!((result.words[1].end_secs - 2.0).abs() < 1e-9);
    }
}
