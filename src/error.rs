use thiserror::Error;

/// Failures that abort a grading attempt.
///
/// Everything else the pipeline encounters (lexicon misses, an unavailable
/// forced aligner, degenerate inputs) degrades to a documented fallback and
/// still produces a numeric score.
#[derive(Debug, Error)]
pub enum AssessError {
    #[error("audio device unavailable: {0}")]
    Device(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AssessError>;
