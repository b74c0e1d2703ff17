//! Word-to-phoneme lookup backed by a CMU-format lexicon.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{AssessError, Result};
use crate::phoneme::{Phoneme, PhonemeEntry};

const BUNDLED_LEXICON: &str = include_str!("../../assets/phonemes/lexicon.txt");

/// Maps lowercased words to ordered phoneme sequences.
///
/// A miss is not an error: the entry degrades to the word's uppercased
/// letters standing in as phonemes, flagged `from_lexicon = false`.
pub trait PhonemeLexicon {
    fn entry(&self, word: &str) -> PhonemeEntry;
}

/// In-memory CMU-style dictionary with an explicit per-instance lookup
/// cache. Constructed once per process and passed into the pipeline; there
/// is no process-global dictionary state.
pub struct CmuLexicon {
    entries: HashMap<String, Vec<Phoneme>>,
    cache: LookupCache,
}

/// Cache of resolved entries, including grapheme fallbacks for misses.
#[derive(Default)]
struct LookupCache {
    resolved: Mutex<HashMap<String, PhonemeEntry>>,
}

impl LookupCache {
    fn get(&self, key: &str) -> Option<PhonemeEntry> {
        self.resolved
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    fn insert(&self, key: String, entry: PhonemeEntry) {
        if let Ok(mut map) = self.resolved.lock() {
            map.insert(key, entry);
        }
    }
}

impl CmuLexicon {
    /// Parses CMU lexicon data: one `WORD PH PH PH` entry per line, `;`
    /// comments, parenthesized alternate pronunciations skipped in favor of
    /// the primary entry.
    pub fn parse(data: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        for (line_no, line) in data.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }
            let mut columns = trimmed.split_whitespace();
            let raw_word = columns.next().ok_or_else(|| {
                AssessError::InvalidConfig(format!("lexicon line {line_no} has no word column"))
            })?;
            if raw_word.contains('(') {
                // Alternate pronunciation variant, e.g. "READ(1)".
                continue;
            }
            let phonemes: Vec<Phoneme> = columns.map(Phoneme::new).collect();
            if phonemes.is_empty() {
                return Err(AssessError::InvalidConfig(format!(
                    "lexicon line {line_no} missing phonemes for {raw_word}"
                )));
            }
            entries.insert(raw_word.to_uppercase(), phonemes);
        }
        if entries.is_empty() {
            return Err(AssessError::InvalidConfig(
                "lexicon contained no entries".into(),
            ));
        }
        Ok(Self {
            entries,
            cache: LookupCache::default(),
        })
    }

    /// Loads the lexicon bundled with the crate.
    pub fn bundled() -> Result<Self> {
        Self::parse(BUNDLED_LEXICON)
    }

    /// Loads a lexicon file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            AssessError::InvalidConfig(format!("failed to read lexicon {path:?}: {err}"))
        })?;
        Self::parse(&data)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PhonemeLexicon for CmuLexicon {
    fn entry(&self, word: &str) -> PhonemeEntry {
        let key = normalize_word(word);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let entry = match self.entries.get(&key) {
            Some(phonemes) => PhonemeEntry {
                word: word.to_lowercase(),
                phonemes: phonemes.clone(),
                from_lexicon: true,
            },
            None => {
                debug!(word, "lexicon miss; using grapheme fallback");
                grapheme_fallback(word)
            }
        };
        self.cache.insert(key, entry.clone());
        entry
    }
}

/// Documented degradation for out-of-lexicon words: each uppercased letter
/// stands in as a phoneme.
pub fn grapheme_fallback(word: &str) -> PhonemeEntry {
    let phonemes = word
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .map(|c| Phoneme::new(c.to_string()))
        .collect();
    PhonemeEntry {
        word: word.to_lowercase(),
        phonemes,
        from_lexicon: false,
    }
}

fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '\'')
        .flat_map(char::to_uppercase)
        .collect()
}
