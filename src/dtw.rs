//! Dynamic time warping over feature-vector sequences.

use ndarray::ArrayView1;
use serde::Serialize;
use tracing::warn;

use crate::config::DtwSettings;
use crate::features::FeatureSequence;

/// Outcome of warping one sequence onto another.
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentResult {
    pub cost: f64,
    pub path_length: usize,
    /// `cost / path_length`.
    pub normalized_distance: f64,
    /// 0-100, higher is more similar.
    pub similarity: f64,
}

impl AlignmentResult {
    fn degenerate() -> Self {
        Self {
            cost: 0.0,
            path_length: 0,
            normalized_distance: 0.0,
            similarity: 0.0,
        }
    }
}

/// Compares two feature sequences with classic DTW.
///
/// With a `band_radius` the search is restricted to a Sakoe-Chiba band
/// around the diagonal, an O(n·radius) speed/accuracy trade-off that loses
/// precision on large time-stretch differences.
#[derive(Debug, Clone, Default)]
pub struct SequenceAligner {
    settings: DtwSettings,
}

impl SequenceAligner {
    pub fn new(settings: DtwSettings) -> Self {
        Self { settings }
    }

    pub fn compare(&self, a: &FeatureSequence, b: &FeatureSequence) -> AlignmentResult {
        if a.is_empty() || b.is_empty() {
            return AlignmentResult::degenerate();
        }
        let lattice = match self.fill_lattice(a, b, self.settings.band_radius) {
            Some(lattice) => lattice,
            None => {
                // A narrow band can disconnect the corner for extreme
                // length ratios; redo the search unconstrained.
                warn!(
                    a_frames = a.frame_count(),
                    b_frames = b.frame_count(),
                    radius = ?self.settings.band_radius,
                    "banded DTW search disconnected; retrying without band"
                );
                self.fill_lattice(a, b, None)
                    .unwrap_or_default()
            }
        };
        if lattice.is_empty() {
            return AlignmentResult::degenerate();
        }
        self.summarize(a, b, &lattice)
    }

    /// Builds the accumulated-cost lattice; `None` when the band never
    /// reaches the terminal cell.
    fn fill_lattice(
        &self,
        a: &FeatureSequence,
        b: &FeatureSequence,
        radius: Option<usize>,
    ) -> Option<Vec<Vec<f64>>> {
        let (n, m) = (a.frame_count(), b.frame_count());
        let mut dp = vec![vec![f64::INFINITY; m + 1]; n + 1];
        dp[0][0] = 0.0;
        for i in 1..=n {
            for j in band_columns(i, n, m, radius) {
                let local = euclidean(a.frames.row(i - 1), b.frames.row(j - 1));
                let best_prev = dp[i - 1][j].min(dp[i][j - 1]).min(dp[i - 1][j - 1]);
                if best_prev.is_finite() {
                    dp[i][j] = local + best_prev;
                }
            }
        }
        dp[n][m].is_finite().then_some(dp)
    }

    fn summarize(
        &self,
        a: &FeatureSequence,
        b: &FeatureSequence,
        dp: &[Vec<f64>],
    ) -> AlignmentResult {
        let (n, m) = (a.frame_count(), b.frame_count());
        let path_length = backtrack_path_length(dp, n, m);
        let cost = dp[n][m];
        let normalized_distance = cost / path_length.max(1) as f64;
        let similarity = (100.0
            * (1.0 - normalized_distance / self.settings.max_expected_distance))
            .clamp(0.0, 100.0);
        AlignmentResult {
            cost,
            path_length,
            normalized_distance,
            similarity,
        }
    }
}

/// Column range of row `i` inside the (optional) Sakoe-Chiba band.
fn band_columns(i: usize, n: usize, m: usize, radius: Option<usize>) -> std::ops::RangeInclusive<usize> {
    match radius {
        None => 1..=m,
        Some(r) => {
            // Center the band on the projected diagonal position.
            let center = (i * m).div_ceil(n.max(1)).max(1);
            let low = center.saturating_sub(r).max(1);
            let high = (center + r).min(m);
            low..=high
        }
    }
}

/// Walks the warping path backwards from the terminal cell, counting steps.
fn backtrack_path_length(dp: &[Vec<f64>], n: usize, m: usize) -> usize {
    let (mut i, mut j) = (n, m);
    let mut length = 0usize;
    while i > 0 && j > 0 {
        length += 1;
        let diagonal = dp[i - 1][j - 1];
        let up = dp[i - 1][j];
        let left = dp[i][j - 1];
        if diagonal <= up && diagonal <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    // Any remaining edge cells belong to the path too.
    length + i.max(j)
}

fn euclidean(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = (x - y) as f64;
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn sequence(rows: Vec<Vec<f32>>) -> FeatureSequence {
        let coefficients = rows.first().map(|r| r.len()).unwrap_or(2);
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let mut features = FeatureSequence::empty(coefficients, 10);
        features.frames = Array2::from_shape_vec((rows.len(), coefficients), flat).unwrap();
        features
    }

    #[test]
    fn euclidean_distance_of_offset_rows() {
        let a = sequence(vec![vec![0.0, 0.0], vec![3.0, 4.0]]);
        let distance = euclidean(a.frames.row(0), a.frames.row(1));
        assert!((distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn band_columns_cover_terminal_cell() {
        let range = band_columns(10, 10, 25, Some(2));
        assert!(range.contains(&25));
    }

    #[test]
    fn identical_sequences_have_zero_distance() {
        let a = sequence(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        let result = SequenceAligner::new(DtwSettings::default()).compare(&a, &a.clone());
        assert_eq!(result.normalized_distance, 0.0);
        assert_eq!(result.similarity, 100.0);
        assert!(result.path_length >= 3);
    }

    #[test]
    fn empty_sequence_scores_zero_similarity() {
        let a = sequence(vec![vec![1.0, 2.0]]);
        let empty = FeatureSequence::empty(2, 10);
        let result = SequenceAligner::new(DtwSettings::default()).compare(&a, &empty);
        assert_eq!(result.similarity, 0.0);
        assert_eq!(result.path_length, 0);
    }
}
