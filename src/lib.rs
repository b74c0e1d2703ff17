//! Pronunciation and fluency assessment pipeline.
//!
//! Given a recorded utterance and a target phrase, the pipeline decides how
//! closely the spoken content matches the expected text and how close the
//! pronunciation is to a reference pronunciation, producing a numeric score,
//! a letter grade, and per-word diagnostics.

pub mod aligner;
pub mod audio;
pub mod config;
pub mod dtw;
pub mod error;
pub mod features;
pub mod phoneme;
pub mod pipeline;
pub mod scoring;
pub mod text;
pub mod transcribe;
pub mod types;

pub use error::{AssessError, Result};
pub use pipeline::{AssessmentRecord, GradingPipeline};
