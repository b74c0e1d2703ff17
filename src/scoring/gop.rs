//! Goodness-of-pronunciation scoring.
//!
//! One canonical GOP convention throughout the crate: per word,
//! `gop = 0.7 * phoneme_match + 0.3 * acoustic_quality` on a [0, 1] scale,
//! and the aggregate maps linearly to a 0-100 pronunciation score. Scores
//! from collaborators using other conventions must be converted at the
//! boundary.

use std::sync::Arc;

use serde::Serialize;

use crate::features::FeatureSequence;
use crate::phoneme::{QualityLabel, WordScore};
use crate::types::WordTiming;

pub const PHONEME_WEIGHT: f64 = 0.7;
pub const ACOUSTIC_WEIGHT: f64 = 0.3;

pub const EXCELLENT_MIN: f64 = 90.0;
pub const GOOD_MIN: f64 = 75.0;
pub const FAIR_MIN: f64 = 60.0;
pub const POOR_MIN: f64 = 30.0;

/// Maps a 0-100 score to its quality bucket.
pub fn label_for(score: f64) -> QualityLabel {
    if score >= EXCELLENT_MIN {
        QualityLabel::Excellent
    } else if score >= GOOD_MIN {
        QualityLabel::Good
    } else if score >= FAIR_MIN {
        QualityLabel::Fair
    } else if score >= POOR_MIN {
        QualityLabel::Poor
    } else {
        QualityLabel::VeryPoor
    }
}

/// Capability interface for the acoustic-quality signal.
///
/// Selected at construction time: either backed by an external acoustic
/// model or by the feature-statistics heuristic. There is no runtime
/// probing for an optional model.
pub trait AcousticQuality: Send + Sync {
    /// Quality estimate in [0, 1] for the word spanning `timing`.
    fn word_quality(&self, features: &FeatureSequence, timing: &WordTiming) -> f64;
    /// True when the estimate comes from a real acoustic model.
    fn model_backed(&self) -> bool;
}

/// External acoustic model boundary: per-word posterior probability over a
/// 16 kHz mono feature window, or `None` where the model has no opinion.
pub trait AcousticModel: Send + Sync {
    fn word_posterior(&self, features: &FeatureSequence, timing: &WordTiming) -> Option<f64>;
}

/// Heuristic fallback: estimates quality from per-coefficient variance
/// across the word's frames. Steadier spectra score higher. Lower
/// confidence than a model; the output record flags its use.
#[derive(Debug, Clone)]
pub struct VarianceQuality {
    /// Variance at or below which quality saturates at 1.0.
    pub variance_floor: f64,
    /// Variance at or above which quality bottoms out at 0.0.
    pub variance_ceiling: f64,
}

impl Default for VarianceQuality {
    fn default() -> Self {
        Self {
            variance_floor: 0.05,
            variance_ceiling: 1.5,
        }
    }
}

impl VarianceQuality {
    fn span_variance(&self, features: &FeatureSequence, timing: &WordTiming) -> f64 {
        let span = features.frame_span(timing.start_secs, timing.end_secs);
        if span.is_empty() || features.coefficients == 0 {
            return self.variance_ceiling;
        }
        let window = features.frames.slice(ndarray::s![span, ..]);
        let rows = window.nrows() as f64;
        let mut total = 0.0;
        for column in window.columns() {
            let mean = column.iter().map(|&v| v as f64).sum::<f64>() / rows;
            let variance = column
                .iter()
                .map(|&v| {
                    let diff = v as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / rows;
            total += variance;
        }
        total / features.coefficients as f64
    }
}

impl AcousticQuality for VarianceQuality {
    fn word_quality(&self, features: &FeatureSequence, timing: &WordTiming) -> f64 {
        let variance = self.span_variance(features, timing);
        let range = (self.variance_ceiling - self.variance_floor).max(f64::EPSILON);
        (1.0 - (variance - self.variance_floor) / range).clamp(0.0, 1.0)
    }

    fn model_backed(&self) -> bool {
        false
    }
}

/// Model-backed quality with the variance heuristic covering words the
/// model declines to score.
pub struct ModelQuality<M: AcousticModel> {
    model: M,
    fallback: VarianceQuality,
}

impl<M: AcousticModel> ModelQuality<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            fallback: VarianceQuality::default(),
        }
    }
}

impl<M: AcousticModel> AcousticQuality for ModelQuality<M> {
    fn word_quality(&self, features: &FeatureSequence, timing: &WordTiming) -> f64 {
        match self.model.word_posterior(features, timing) {
            Some(posterior) => posterior.clamp(0.0, 1.0),
            None => self.fallback.word_quality(features, timing),
        }
    }

    fn model_backed(&self) -> bool {
        true
    }
}

/// Aggregate pronunciation verdict for the utterance.
#[derive(Debug, Clone, Serialize)]
pub struct GopSummary {
    /// Mean per-word GOP on the canonical [0, 1] scale.
    pub overall_gop: f64,
    /// `100 * overall_gop`.
    pub pronunciation_score: f64,
    pub quality: QualityLabel,
    pub used_acoustic_model: bool,
}

/// Blends phoneme-match ratios with the acoustic-quality signal.
pub struct PronunciationScorer {
    quality: Arc<dyn AcousticQuality>,
}

impl PronunciationScorer {
    pub fn new(quality: Arc<dyn AcousticQuality>) -> Self {
        Self { quality }
    }

    /// Fills in per-word acoustic quality, GOP, and labels, then summarizes.
    ///
    /// Expected words (matched or missing) all weigh into the aggregate;
    /// `WrongWord` extras are diagnostics only. No expected words at all
    /// yields a zero summary.
    pub fn score(
        &self,
        words: &mut [WordScore],
        features: &FeatureSequence,
        timings: &[WordTiming],
    ) -> GopSummary {
        let mut total = 0.0;
        let mut counted = 0usize;
        for word in words.iter_mut() {
            match word.label {
                QualityLabel::WrongWord => continue,
                QualityLabel::Missing => {
                    counted += 1;
                    continue;
                }
                _ => {}
            }
            let quality = word
                .actual_index
                .and_then(|index| timings.get(index))
                .map(|timing| self.quality.word_quality(features, timing))
                .unwrap_or(0.0);
            word.acoustic_quality = quality;
            word.gop = (PHONEME_WEIGHT * word.phoneme_match + ACOUSTIC_WEIGHT * quality)
                .clamp(0.0, 1.0);
            word.label = label_for(word.gop * 100.0);
            total += word.gop;
            counted += 1;
        }
        let overall_gop = if counted == 0 {
            0.0
        } else {
            total / counted as f64
        };
        let pronunciation_score = (overall_gop * 100.0).clamp(0.0, 100.0);
        GopSummary {
            overall_gop,
            pronunciation_score,
            quality: label_for(pronunciation_score),
            used_acoustic_model: self.quality.model_backed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn flat_features(frames: usize) -> FeatureSequence {
        let mut features = FeatureSequence::empty(4, 10);
        features.frames = Array2::zeros((frames, 4));
        features
    }

    #[test]
    fn label_thresholds_are_inclusive() {
        assert_eq!(label_for(90.0), QualityLabel::Excellent);
        assert_eq!(label_for(75.0), QualityLabel::Good);
        assert_eq!(label_for(60.0), QualityLabel::Fair);
        assert_eq!(label_for(30.0), QualityLabel::Poor);
        assert_eq!(label_for(29.9), QualityLabel::VeryPoor);
    }

    #[test]
    fn constant_features_estimate_high_quality() {
        let features = flat_features(100);
        let quality = VarianceQuality::default();
        let timing = WordTiming::new("steady", 0.0, 1.0);
        let estimate = quality.word_quality(&features, &timing);
        assert!(estimate > 0.9, "constant signal should score high: {estimate}");
    }

    #[test]
    fn out_of_range_span_estimates_worst_quality() {
        let features = flat_features(10);
        let quality = VarianceQuality::default();
        let timing = WordTiming::new("late", 5.0, 6.0);
        assert_eq!(quality.word_quality(&features, &timing), 0.0);
    }

    #[test]
    fn model_quality_prefers_model_posterior() {
        struct Fixed(f64);
        impl AcousticModel for Fixed {
            fn word_posterior(&self, _: &FeatureSequence, _: &WordTiming) -> Option<f64> {
                Some(self.0)
            }
        }
        let quality = ModelQuality::new(Fixed(0.25));
        let features = flat_features(10);
        let timing = WordTiming::new("word", 0.0, 0.1);
        assert_eq!(quality.word_quality(&features, &timing), 0.25);
        assert!(quality.model_backed());
    }
}
