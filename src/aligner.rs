//! Optional forced-alignment collaborator with a uniform-slice fallback.
//!
//! The external tool runs as a subprocess against files in a scoped
//! temporary directory; the directory is removed on every exit path. An
//! unavailable or failing aligner is not an error: the pipeline degrades to
//! uniform per-word timings and flags the result.

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, warn};

use crate::audio::wav;
use crate::types::{AudioBuffer, WordTiming};

/// Non-fatal condition: the caller falls back to heuristic timings.
#[derive(Debug, Error)]
#[error("forced aligner unavailable: {0}")]
pub struct AlignerUnavailable(pub String);

/// External word-level time aligner.
pub trait ForcedAligner: Send + Sync {
    fn align(
        &self,
        audio: &AudioBuffer,
        words: &[String],
    ) -> std::result::Result<Vec<WordTiming>, AlignerUnavailable>;
}

/// Invokes an external aligner binary: `<command> <audio.wav> <transcript>`,
/// expecting one `word<TAB>start_secs<TAB>end_secs` line per word on stdout.
pub struct SubprocessAligner {
    command: PathBuf,
}

impl SubprocessAligner {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }
}

impl ForcedAligner for SubprocessAligner {
    fn align(
        &self,
        audio: &AudioBuffer,
        words: &[String],
    ) -> std::result::Result<Vec<WordTiming>, AlignerUnavailable> {
        // TempDir removal on drop covers every exit path below.
        let workdir = TempDir::new()
            .map_err(|err| AlignerUnavailable(format!("tempdir creation failed: {err}")))?;
        let audio_path = workdir.path().join("utterance.wav");
        let transcript_path = workdir.path().join("transcript.txt");
        wav::write(&audio_path, audio)
            .map_err(|err| AlignerUnavailable(format!("failed to stage audio: {err}")))?;
        std::fs::write(&transcript_path, words.join(" "))
            .map_err(|err| AlignerUnavailable(format!("failed to stage transcript: {err}")))?;

        let output = Command::new(&self.command)
            .arg(&audio_path)
            .arg(&transcript_path)
            .output()
            .map_err(|err| {
                AlignerUnavailable(format!("failed to launch {:?}: {err}", self.command))
            })?;
        if !output.status.success() {
            return Err(AlignerUnavailable(format!(
                "{:?} exited with {}",
                self.command, output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let timings = parse_timing_lines(&stdout)?;
        if timings.len() != words.len() {
            return Err(AlignerUnavailable(format!(
                "aligner returned {} timings for {} words",
                timings.len(),
                words.len()
            )));
        }
        info!(words = timings.len(), "forced alignment succeeded");
        Ok(timings)
    }
}

fn parse_timing_lines(stdout: &str) -> std::result::Result<Vec<WordTiming>, AlignerUnavailable> {
    let mut timings = Vec::new();
    for (line_no, line) in stdout.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut fields = trimmed.split('\t');
        let parsed = (|| {
            let word = fields.next()?;
            let start = fields.next()?.parse::<f64>().ok()?;
            let end = fields.next()?.parse::<f64>().ok()?;
            (end >= start).then(|| WordTiming::new(word, start, end))
        })();
        match parsed {
            Some(timing) => timings.push(timing),
            None => {
                return Err(AlignerUnavailable(format!(
                    "malformed timing line {line_no}: {trimmed:?}"
                )))
            }
        }
    }
    Ok(timings)
}

/// Degraded-but-functional fallback: equal time slices per word.
pub fn uniform_timings(words: &[String], duration_secs: f64) -> Vec<WordTiming> {
    if words.is_empty() {
        return Vec::new();
    }
    let slice = (duration_secs.max(0.0)) / words.len() as f64;
    words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            WordTiming::new(word.clone(), index as f64 * slice, (index + 1) as f64 * slice)
        })
        .collect()
}

/// Resolves word timings, preferring the forced aligner and falling back to
/// uniform slices. Returns the timings and whether the heuristic was used.
pub fn resolve_timings(
    aligner: Option<&dyn ForcedAligner>,
    audio: &AudioBuffer,
    words: &[String],
    transcribed: &[WordTiming],
) -> (Vec<WordTiming>, bool) {
    if let Some(aligner) = aligner {
        match aligner.align(audio, words) {
            Ok(timings) => return (timings, false),
            Err(err) => {
                warn!(error = %err, "falling back to heuristic word timings");
            }
        }
    }
    // Transcriber timestamps are usable when they line up one-to-one with
    // the tokenized words.
    if transcribed.len() == words.len() && !words.is_empty() {
        return (transcribed.to_vec(), false);
    }
    (uniform_timings(words, audio.duration_secs()), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn uniform_timings_partition_the_duration() {
        let timings = uniform_timings(&words(&["a", "b", "c", "d"]), 2.0);
        assert_eq!(timings.len(), 4);
        assert!((timings[0].end_secs - 0.5).abs() < 1e-9);
        assert!((timings[3].start_secs - 1.5).abs() < 1e-9);
        assert!(uniform_timings(&[], 2.0).is_empty());
    }

    #[test]
    fn parses_tab_separated_timing_lines() {
        let parsed = parse_timing_lines("the\t0.0\t0.4\nfox\t0.4\t0.9\n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].word, "fox");
        assert!(parse_timing_lines("bad line\n").is_err());
    }

    #[test]
    fn failing_subprocess_falls_back_to_uniform() {
        let aligner = SubprocessAligner::new(PathBuf::from("/nonexistent/aligner-binary"));
        let audio = AudioBuffer::mono(vec![0; 16_000], 16_000);
        let tokens = words(&["one", "two"]);
        let (timings, heuristic) = resolve_timings(Some(&aligner), &audio, &tokens, &[]);
        assert!(heuristic);
        assert_eq!(timings.len(), 2);
        assert!((timings[1].end_secs - 1.0).abs() < 1e-9);
    }
}
