//! End-to-end grading orchestration.
//!
//! Collaborators (lexicon, transcriber, forced aligner, acoustic-quality
//! source) are injected at construction. Every stage after capture is a
//! pure function over immutable inputs, so one pipeline instance can serve
//! concurrent grading requests without locks; within a request, the DTW
//! comparison and the phoneme alignment run on separate threads and join
//! before composite scoring.

use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tracing::{debug, info};

use crate::aligner::{self, ForcedAligner};
use crate::config::AssessConfig;
use crate::dtw::{AlignmentResult, SequenceAligner};
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::phoneme::lexicon::PhonemeLexicon;
use crate::phoneme::{PhonemeAligner, PhonemeEntry, WordScore};
use crate::scoring::composite::{CompositeScorer, FinalScore};
use crate::scoring::gop::{AcousticQuality, GopSummary, PronunciationScorer, VarianceQuality};
use crate::text;
use crate::transcribe::Transcriber;
use crate::types::AudioBuffer;

/// Serializable result record for one grading attempt. The calling layer
/// chooses the persistence format.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRecord {
    pub transcript: String,
    pub expected_text: String,
    pub word_scores: Vec<WordScore>,
    pub gop: GopSummary,
    pub dtw: Option<AlignmentResult>,
    pub final_score: FinalScore,
    pub word_count_ratio: f64,
    /// True when word timings came from the uniform-slice fallback.
    pub used_heuristic_alignment: bool,
    /// True when the expected phrase had no words to evaluate.
    pub nothing_to_evaluate: bool,
}

pub struct GradingPipeline {
    lexicon: Arc<dyn PhonemeLexicon + Send + Sync>,
    transcriber: Arc<dyn Transcriber>,
    forced_aligner: Option<Arc<dyn ForcedAligner>>,
    extractor: FeatureExtractor,
    sequence_aligner: SequenceAligner,
    phoneme_aligner: PhonemeAligner,
    scorer: PronunciationScorer,
    composite: CompositeScorer,
}

impl GradingPipeline {
    /// Builds a pipeline with the heuristic acoustic-quality fallback; use
    /// [`GradingPipeline::with_acoustic_quality`] to attach a model-backed
    /// source.
    pub fn new(
        config: &AssessConfig,
        lexicon: Arc<dyn PhonemeLexicon + Send + Sync>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lexicon,
            transcriber,
            forced_aligner: None,
            extractor: FeatureExtractor::new(config.features.clone()),
            sequence_aligner: SequenceAligner::new(config.dtw.clone()),
            phoneme_aligner: PhonemeAligner::new(),
            scorer: PronunciationScorer::new(Arc::new(VarianceQuality::default())),
            composite: CompositeScorer::new(),
        })
    }

    pub fn with_forced_aligner(mut self, forced_aligner: Arc<dyn ForcedAligner>) -> Self {
        self.forced_aligner = Some(forced_aligner);
        self
    }

    pub fn with_acoustic_quality(mut self, quality: Arc<dyn AcousticQuality>) -> Self {
        self.scorer = PronunciationScorer::new(quality);
        self
    }

    /// Grades one utterance against the expected phrase.
    ///
    /// Only transcription failure aborts; lexicon misses, aligner failures,
    /// and degenerate inputs degrade to their documented fallbacks and the
    /// record still carries a numeric score.
    pub fn grade(
        &self,
        audio: &AudioBuffer,
        expected_text: &str,
        reference: Option<&AudioBuffer>,
    ) -> Result<AssessmentRecord> {
        let transcription = self.transcriber.transcribe(audio)?;
        info!(transcript = %transcription.text, "utterance transcribed");

        let expected_tokens = text::tokenize(expected_text);
        let actual_tokens = text::tokenize(&transcription.text);
        let expected_entries = self.entries_for(&expected_tokens);
        let actual_entries = self.entries_for(&actual_tokens);

        let (timings, used_heuristic_alignment) = aligner::resolve_timings(
            self.forced_aligner.as_deref(),
            audio,
            &actual_tokens,
            &transcription.words,
        );

        let features = self.extractor.extract(audio);
        // DTW and phoneme alignment are independent; join before scoring.
        let extractor = &self.extractor;
        let sequence_aligner = &self.sequence_aligner;
        let learner_features = &features;
        let (dtw, mut alignment) = thread::scope(|scope| {
            let dtw_handle = reference.map(|clip| {
                scope.spawn(move || {
                    let reference_features = extractor.extract(clip);
                    sequence_aligner.compare(&reference_features, learner_features)
                })
            });
            let alignment = self
                .phoneme_aligner
                .align_utterance(&expected_entries, &actual_entries);
            let dtw =
                dtw_handle.map(|handle| handle.join().expect("DTW comparison thread panicked"));
            (dtw, alignment)
        });

        let gop = self.scorer.score(&mut alignment.words, &features, &timings);
        let content_accuracy = if alignment.is_empty_reference {
            0.0
        } else {
            100.0 * text::sequence_similarity(&expected_tokens, &actual_tokens)
        };
        let word_count_ratio = if expected_tokens.is_empty() {
            0.0
        } else {
            actual_tokens.len() as f64 / expected_tokens.len() as f64
        };
        debug!(
            content_accuracy,
            word_count_ratio,
            pronunciation = gop.pronunciation_score,
            native = ?dtw.as_ref().map(|r| r.similarity),
            "sub-scores ready"
        );

        let final_score = self.composite.finalize(
            content_accuracy,
            &gop,
            dtw.as_ref().map(|result| result.similarity),
            word_count_ratio,
        );
        info!(
            composite = final_score.composite,
            grade = ?final_score.grade,
            "grading attempt complete"
        );

        Ok(AssessmentRecord {
            transcript: transcription.text,
            expected_text: expected_text.to_string(),
            word_scores: alignment.words,
            gop,
            dtw,
            final_score,
            word_count_ratio,
            used_heuristic_alignment,
            nothing_to_evaluate: alignment.is_empty_reference,
        })
    }

    fn entries_for(&self, tokens: &[String]) -> Vec<PhonemeEntry> {
        tokens
            .iter()
            .map(|token| self.lexicon.entry(token))
            .collect()
    }
}
