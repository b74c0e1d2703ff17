use std::sync::Arc;

use speakscore::config::AssessConfig;
use speakscore::features::FeatureSequence;
use speakscore::phoneme::lexicon::CmuLexicon;
use speakscore::phoneme::QualityLabel;
use speakscore::scoring::composite::Grade;
use speakscore::scoring::gop::AcousticQuality;
use speakscore::transcribe::FixedTranscriber;
use speakscore::types::{AudioBuffer, WordTiming};
use speakscore::GradingPipeline;

struct SteadyQuality(f64);

impl AcousticQuality for SteadyQuality {
    fn word_quality(&self, _: &FeatureSequence, _: &WordTiming) -> f64 {
        self.0
    }
    fn model_backed(&self) -> bool {
        true
    }
}

/// One-second 220 Hz tone; enough signal for feature extraction.
fn tone_buffer(seconds: f64) -> AudioBuffer {
    let sample_rate = 16_000u32;
    let count = (sample_rate as f64 * seconds) as usize;
    let samples: Vec<f32> = (0..count)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (t * 2.0 * std::f32::consts::PI * 220.0).sin() * 0.4
        })
        .collect();
    AudioBuffer::from_f32(&samples, sample_rate)
}

fn pipeline_for(transcript: &str) -> GradingPipeline {
    let config = AssessConfig::default();
    let lexicon = Arc::new(CmuLexicon::bundled().unwrap());
    let transcriber = Arc::new(FixedTranscriber::new(transcript));
    GradingPipeline::new(&config, lexicon, transcriber)
        .unwrap()
        .with_acoustic_quality(Arc::new(SteadyQuality(0.9)))
}

#[test]
fn perfect_repetition_scores_high_across_the_board() {
    let pipeline = pipeline_for("the quick brown fox");
    let audio = tone_buffer(2.0);

    let record = pipeline
        .grade(&audio, "the quick brown fox", None)
        .unwrap();

    assert!((record.final_score.content_accuracy - 100.0).abs() < 1e-9);
    assert_eq!(record.word_scores.len(), 4);
    assert!(record.word_scores.iter().all(|w| matches!(
        w.label,
        QualityLabel::Excellent | QualityLabel::Good
    )));
    assert!(!record
        .word_scores
        .iter()
        .any(|w| matches!(w.label, QualityLabel::Missing | QualityLabel::WrongWord)));
    assert!((record.word_count_ratio - 1.0).abs() < 1e-9);
    assert!(record.gop.used_acoustic_model);
    assert!(!record.nothing_to_evaluate);
    assert!(record.final_score.composite > 85.0);
}

#[test]
fn truncated_answer_is_penalized_and_flagged() {
    let pipeline = pipeline_for("one two three");
    let audio = tone_buffer(2.0);
    let expected = "one two three four five six seven eight nine ten";

    let record = pipeline.grade(&audio, expected, None).unwrap();

    let missing = record
        .word_scores
        .iter()
        .filter(|w| w.label == QualityLabel::Missing)
        .count();
    assert_eq!(missing, 7);
    assert!((record.word_count_ratio - 0.3).abs() < 1e-9);
    assert!(record.final_score.too_short);
    assert_eq!(record.final_score.grade, Grade::F);
    // Degraded, but still numeric.
    assert!(record.final_score.composite.is_finite());
}

#[test]
fn reference_recording_adds_native_similarity() {
    let pipeline = pipeline_for("hello world");
    let audio = tone_buffer(1.5);

    let record = pipeline
        .grade(&audio, "hello world", Some(&audio.clone()))
        .unwrap();

    let dtw = record.dtw.expect("reference comparison should run");
    // Identical audio warps onto itself perfectly.
    assert!((dtw.similarity - 100.0).abs() < 1e-6);
    assert_eq!(
        record.final_score.native_similarity,
        Some(dtw.similarity)
    );
}

#[test]
fn empty_expected_phrase_yields_zero_scores_not_errors() {
    let pipeline = pipeline_for("hello world");
    let audio = tone_buffer(1.0);

    let record = pipeline.grade(&audio, "", None).unwrap();

    assert!(record.nothing_to_evaluate);
    assert!(record.word_scores.is_empty());
    assert_eq!(record.final_score.content_accuracy, 0.0);
    assert_eq!(record.final_score.composite, 0.0);
    assert!(record.final_score.composite.is_finite());
}

#[test]
fn unknown_words_grade_through_the_grapheme_fallback() {
    let pipeline = pipeline_for("zyzzyva");
    let audio = tone_buffer(1.0);

    let record = pipeline.grade(&audio, "zyzzyva", None).unwrap();

    assert_eq!(record.word_scores.len(), 1);
    let word = &record.word_scores[0];
    assert_eq!(word.phoneme_match, 1.0);
    assert!(!matches!(word.label, QualityLabel::Missing | QualityLabel::WrongWord));
    assert!(record.final_score.composite > 0.0);
}

#[test]
fn transcriber_timings_avoid_the_heuristic_fallback() {
    let pipeline = pipeline_for("the quick brown fox");
    let audio = tone_buffer(2.0);
    let record = pipeline
        .grade(&audio, "the quick brown fox", None)
        .unwrap();
    // FixedTranscriber supplies one timing per token.
    assert!(!record.used_heuristic_alignment);
}
