//! Text normalization and sequence-distance helpers.

/// Splits free text into lowercase word tokens, dropping punctuation.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter_map(|raw| {
            let token: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .flat_map(|c| c.to_lowercase())
                .collect();
            (!token.is_empty()).then_some(token)
        })
        .collect()
}

/// Levenshtein distance with unit insertion/deletion/substitution costs.
///
/// Two-row dynamic program over any comparable element type, shared by the
/// phoneme aligner (symbol sequences) and the content scorer (word and
/// character sequences).
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, item_a) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, item_b) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(item_a != item_b);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Normalized similarity of two sequences: `1 - distance / max_len` in [0, 1].
///
/// Both sequences empty compares as identical.
pub fn sequence_similarity<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b) as f64;
    (1.0 - distance / longest as f64).clamp(0.0, 1.0)
}

/// Character-level similarity of two words.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let chars_a: Vec<char> = a.chars().collect();
    let chars_b: Vec<char> = b.chars().collect();
    sequence_similarity(&chars_a, &chars_b)
}
