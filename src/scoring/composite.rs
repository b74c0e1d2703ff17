//! Final blended score and letter grade.

use serde::Serialize;
use tracing::debug;

use crate::scoring::gop::GopSummary;

// Blend weights with and without a native-similarity signal.
const PRONUNCIATION_WEIGHT_FULL: f64 = 0.4;
const CONTENT_WEIGHT_FULL: f64 = 0.3;
const NATIVE_WEIGHT_FULL: f64 = 0.3;
const PRONUNCIATION_WEIGHT_PARTIAL: f64 = 0.6;
const CONTENT_WEIGHT_PARTIAL: f64 = 0.4;

/// Spoken-to-expected word-count ratio below which the utterance counts as
/// too short, halving the composite and forcing the lowest grade.
pub const SHORT_UTTERANCE_RATIO: f64 = 0.5;
const SHORT_UTTERANCE_PENALTY: f64 = 0.5;

pub const GRADE_A_MIN: f64 = 90.0;
pub const GRADE_B_MIN: f64 = 80.0;
pub const GRADE_C_MIN: f64 = 70.0;
pub const GRADE_D_MIN: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

pub fn grade_for(score: f64) -> Grade {
    if score >= GRADE_A_MIN {
        Grade::A
    } else if score >= GRADE_B_MIN {
        Grade::B
    } else if score >= GRADE_C_MIN {
        Grade::C
    } else if score >= GRADE_D_MIN {
        Grade::D
    } else {
        Grade::F
    }
}

/// Blended verdict for one grading attempt. `composite` is clamped to
/// [0, 100] after all penalties.
#[derive(Debug, Clone, Serialize)]
pub struct FinalScore {
    pub content_accuracy: f64,
    pub pronunciation_score: f64,
    pub native_similarity: Option<f64>,
    pub composite: f64,
    pub grade: Grade,
    /// True when the short-utterance penalty fired.
    pub too_short: bool,
}

/// Blends content accuracy, GOP output, and the optional DTW similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeScorer;

impl CompositeScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn finalize(
        &self,
        content_accuracy: f64,
        gop: &GopSummary,
        native_similarity: Option<f64>,
        word_count_ratio: f64,
    ) -> FinalScore {
        let content = content_accuracy.clamp(0.0, 100.0);
        let pronunciation = gop.pronunciation_score.clamp(0.0, 100.0);
        let mut composite = match native_similarity {
            Some(native) => {
                PRONUNCIATION_WEIGHT_FULL * pronunciation
                    + CONTENT_WEIGHT_FULL * content
                    + NATIVE_WEIGHT_FULL * native.clamp(0.0, 100.0)
            }
            None => {
                PRONUNCIATION_WEIGHT_PARTIAL * pronunciation + CONTENT_WEIGHT_PARTIAL * content
            }
        };

        let too_short = word_count_ratio < SHORT_UTTERANCE_RATIO;
        if too_short {
            debug!(
                word_count_ratio,
                composite, "short utterance; halving composite and forcing lowest grade"
            );
            composite *= SHORT_UTTERANCE_PENALTY;
        }
        let composite = composite.clamp(0.0, 100.0);
        let grade = if too_short {
            Grade::F
        } else {
            grade_for(composite)
        };

        FinalScore {
            content_accuracy: content,
            pronunciation_score: pronunciation,
            native_similarity: native_similarity.map(|n| n.clamp(0.0, 100.0)),
            composite,
            grade,
            too_short,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phoneme::QualityLabel;

    fn summary(score: f64) -> GopSummary {
        GopSummary {
            overall_gop: score / 100.0,
            pronunciation_score: score,
            quality: QualityLabel::Good,
            used_acoustic_model: false,
        }
    }

    #[test]
    fn grade_boundaries_match_named_thresholds() {
        assert_eq!(grade_for(90.0), Grade::A);
        assert_eq!(grade_for(89.9), Grade::B);
        assert_eq!(grade_for(70.0), Grade::C);
        assert_eq!(grade_for(60.0), Grade::D);
        assert_eq!(grade_for(59.9), Grade::F);
    }

    #[test]
    fn weights_switch_with_native_similarity() {
        let scorer = CompositeScorer::new();
        let with_native = scorer.finalize(80.0, &summary(90.0), Some(70.0), 1.0);
        assert!((with_native.composite - (0.4 * 90.0 + 0.3 * 80.0 + 0.3 * 70.0)).abs() < 1e-9);

        let without = scorer.finalize(80.0, &summary(90.0), None, 1.0);
        assert!((without.composite - (0.6 * 90.0 + 0.4 * 80.0)).abs() < 1e-9);
    }

    #[test]
    fn short_utterance_halves_score_and_forces_f() {
        let scorer = CompositeScorer::new();
        let full = scorer.finalize(100.0, &summary(100.0), None, 1.0);
        let short = scorer.finalize(100.0, &summary(100.0), None, 0.4);
        assert!(short.too_short);
        assert_eq!(short.grade, Grade::F);
        assert!(short.composite <= full.composite * 0.5 + 1e-9);
    }
}
