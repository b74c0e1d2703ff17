//! Phoneme-sequence alignment between expected and spoken words.

pub mod lexicon;

use serde::Serialize;
use tracing::debug;

use crate::text;

/// Combined-score floor below which an actual word is not claimed for an
/// expected word.
pub const MIN_MATCH_SCORE: f64 = 0.3;
const PHONEME_WEIGHT: f64 = 0.7;
const SPELLING_WEIGHT: f64 = 0.3;

/// One pronunciation symbol, optionally carrying a trailing stress digit
/// (ARPAbet style, e.g. `AH0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phoneme(String);

impl Phoneme {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol with any stress marker stripped; comparisons use this form.
    pub fn base(&self) -> &str {
        self.0.trim_end_matches(|c: char| c.is_ascii_digit())
    }
}

/// A word together with its pronunciation.
///
/// `from_lexicon` is false for the documented grapheme fallback applied to
/// words missing from the dictionary.
#[derive(Debug, Clone, Serialize)]
pub struct PhonemeEntry {
    pub word: String,
    pub phonemes: Vec<Phoneme>,
    pub from_lexicon: bool,
}

/// Per-word pronunciation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
    /// Expected word with no acceptable match in the utterance.
    Missing,
    /// Spoken word that no expected word claimed.
    WrongWord,
}

/// Diagnostic for one expected or spoken word.
#[derive(Debug, Clone, Serialize)]
pub struct WordScore {
    pub expected: Option<String>,
    pub actual: Option<String>,
    /// Index into the actual-word list, for matched words.
    pub actual_index: Option<usize>,
    /// Phoneme match ratio in [0, 1].
    pub phoneme_match: f64,
    /// Acoustic quality estimate in [0, 1]; filled in by the GOP scorer.
    pub acoustic_quality: f64,
    /// Goodness-of-pronunciation in [0, 1]; filled in by the GOP scorer.
    pub gop: f64,
    pub label: QualityLabel,
}

/// Utterance-level alignment output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UtteranceAlignment {
    pub words: Vec<WordScore>,
    /// Nothing-to-evaluate signal: the expected phrase had zero words.
    pub is_empty_reference: bool,
}

/// Aligns phoneme sequences by edit distance and matches words greedily.
#[derive(Debug, Clone, Default)]
pub struct PhonemeAligner;

impl PhonemeAligner {
    pub fn new() -> Self {
        Self
    }

    /// Match ratio between two phoneme sequences, stress markers stripped.
    ///
    /// Both sequences empty compares as a perfect match; exactly one empty
    /// is a total miss.
    pub fn align_word(&self, expected: &[Phoneme], actual: &[Phoneme]) -> f64 {
        if expected.is_empty() && actual.is_empty() {
            return 1.0;
        }
        if expected.is_empty() || actual.is_empty() {
            return 0.0;
        }
        let expected_base: Vec<&str> = expected.iter().map(Phoneme::base).collect();
        let actual_base: Vec<&str> = actual.iter().map(Phoneme::base).collect();
        text::sequence_similarity(&expected_base, &actual_base)
    }

    /// Matches each expected word to at most one spoken word.
    ///
    /// Matching is greedy in expected-word order, not an optimal
    /// assignment: each expected word claims the best unclaimed spoken word
    /// by `0.7 * phoneme_match + 0.3 * spelling_similarity`, provided the
    /// combined score reaches `MIN_MATCH_SCORE`. An already-claimed index is
    /// never reused, so the mapping stays injective.
    pub fn align_utterance(
        &self,
        expected: &[PhonemeEntry],
        actual: &[PhonemeEntry],
    ) -> UtteranceAlignment {
        if expected.is_empty() {
            debug!("expected phrase empty; nothing to evaluate");
            return UtteranceAlignment {
                words: Vec::new(),
                is_empty_reference: true,
            };
        }

        let mut claimed = vec![false; actual.len()];
        let mut words = Vec::with_capacity(expected.len());
        for entry in expected {
            match self.claim_best_match(entry, actual, &mut claimed) {
                Some(word) => words.push(word),
                None => words.push(WordScore {
                    expected: Some(entry.word.clone()),
                    actual: None,
                    actual_index: None,
                    phoneme_match: 0.0,
                    acoustic_quality: 0.0,
                    gop: 0.0,
                    label: QualityLabel::Missing,
                }),
            }
        }

        // Leftover speech the prompt did not ask for; it never contributes
        // positively to any score.
        for (index, entry) in actual.iter().enumerate() {
            if !claimed[index] {
                words.push(WordScore {
                    expected: None,
                    actual: Some(entry.word.clone()),
                    actual_index: Some(index),
                    phoneme_match: 0.0,
                    acoustic_quality: 0.0,
                    gop: 0.0,
                    label: QualityLabel::WrongWord,
                });
            }
        }

        UtteranceAlignment {
            words,
            is_empty_reference: false,
        }
    }

    fn claim_best_match(
        &self,
        expected: &PhonemeEntry,
        actual: &[PhonemeEntry],
        claimed: &mut [bool],
    ) -> Option<WordScore> {
        let mut best: Option<(usize, f64, f64)> = None;
        for (index, candidate) in actual.iter().enumerate() {
            if claimed[index] {
                continue;
            }
            let phoneme_match = self.align_word(&expected.phonemes, &candidate.phonemes);
            let spelling = text::string_similarity(&expected.word, &candidate.word);
            let combined = PHONEME_WEIGHT * phoneme_match + SPELLING_WEIGHT * spelling;
            let improves = best.map(|(_, _, score)| combined > score).unwrap_or(true);
            if improves {
                best = Some((index, phoneme_match, combined));
            }
        }
        let (index, phoneme_match, combined) = best?;
        if combined < MIN_MATCH_SCORE {
            return None;
        }
        claimed[index] = true;
        Some(WordScore {
            expected: Some(expected.word.clone()),
            actual: Some(actual[index].word.clone()),
            actual_index: Some(index),
            phoneme_match,
            acoustic_quality: 0.0,
            gop: 0.0,
            // Provisional; the GOP scorer assigns the final label.
            label: QualityLabel::Fair,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phonemes(symbols: &[&str]) -> Vec<Phoneme> {
        symbols.iter().map(|s| Phoneme::new(*s)).collect()
    }

    #[test]
    fn stress_markers_do_not_affect_matching() {
        let aligner = PhonemeAligner::new();
        let stressed = phonemes(&["HH", "AH0", "L", "OW1"]);
        let unstressed = phonemes(&["HH", "AH", "L", "OW"]);
        assert_eq!(aligner.align_word(&stressed, &unstressed), 1.0);
    }

    #[test]
    fn empty_sequences_follow_documented_edge_cases() {
        let aligner = PhonemeAligner::new();
        let some = phonemes(&["K", "AE", "T"]);
        assert_eq!(aligner.align_word(&[], &[]), 1.0);
        assert_eq!(aligner.align_word(&some, &[]), 0.0);
        assert_eq!(aligner.align_word(&[], &some), 0.0);
    }

    #[test]
    fn substitution_reduces_ratio_proportionally() {
        let aligner = PhonemeAligner::new();
        let expected = phonemes(&["K", "AE", "T"]);
        let actual = phonemes(&["B", "AE", "T"]);
        let ratio = aligner.align_word(&expected, &actual);
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
    }
}
