use approx::assert_relative_eq;
use ndarray::Array2;
use speakscore::config::DtwSettings;
use speakscore::dtw::SequenceAligner;
use speakscore::features::FeatureSequence;

fn sequence(rows: Vec<Vec<f32>>) -> FeatureSequence {
    let coefficients = rows.first().map(|row| row.len()).unwrap_or(2);
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    let mut features = FeatureSequence::empty(coefficients, 10);
    features.frames = Array2::from_shape_vec((rows.len(), coefficients), flat).unwrap();
    features
}

/// Slow sweep through feature space, `frames` rows long.
fn sweep(frames: usize) -> FeatureSequence {
    let rows = (0..frames)
        .map(|i| {
            let t = i as f32 / frames as f32;
            vec![t, 2.0 * t, 1.0 - t]
        })
        .collect();
    sequence(rows)
}

#[test]
fn self_comparison_is_perfect() {
    let aligner = SequenceAligner::new(DtwSettings::default());
    let features = sweep(40);
    let result = aligner.compare(&features, &features.clone());
    assert_relative_eq!(result.normalized_distance, 0.0);
    assert_relative_eq!(result.similarity, 100.0);
    assert_relative_eq!(result.cost, 0.0);
    assert!(result.path_length >= 40);
}

#[test]
fn normalized_distance_is_cost_over_path_length() {
    let aligner = SequenceAligner::new(DtwSettings::default());
    let a = sweep(30);
    let b = sequence(
        (0..30)
            .map(|i| {
                let t = i as f32 / 30.0;
                vec![t + 0.1, 2.0 * t, 1.0 - t]
            })
            .collect(),
    );
    let result = aligner.compare(&a, &b);
    assert!(result.cost > 0.0);
    assert_relative_eq!(
        result.normalized_distance,
        result.cost / result.path_length as f64,
        epsilon = 1e-9
    );
    assert!(result.similarity > 0.0 && result.similarity < 100.0);
}

#[test]
fn time_stretched_sequence_stays_similar() {
    let aligner = SequenceAligner::new(DtwSettings::default());
    let normal = sweep(30);
    let stretched = sweep(60);
    let result = aligner.compare(&normal, &stretched);
    // Warping absorbs the tempo difference; the content is identical.
    assert!(
        result.similarity > 90.0,
        "stretch should warp cleanly, got {}",
        result.similarity
    );
}

#[test]
fn zero_frame_input_scores_zero_similarity() {
    let aligner = SequenceAligner::new(DtwSettings::default());
    let features = sweep(10);
    let empty = FeatureSequence::empty(3, 10);
    assert_eq!(aligner.compare(&features, &empty).similarity, 0.0);
    assert_eq!(aligner.compare(&empty, &features).similarity, 0.0);
    assert_eq!(aligner.compare(&empty, &empty.clone()).similarity, 0.0);
}

#[test]
fn banded_search_matches_full_search_on_identical_input() {
    let features = sweep(50);
    let banded = SequenceAligner::new(DtwSettings {
        band_radius: Some(3),
        ..DtwSettings::default()
    });
    let result = banded.compare(&features, &features.clone());
    assert_relative_eq!(result.similarity, 100.0);
}

#[test]
fn narrow_band_still_produces_a_finite_result() {
    // Length ratio far beyond the band width: the banded lattice may
    // disconnect and the aligner must recover, not panic.
    let banded = SequenceAligner::new(DtwSettings {
        band_radius: Some(1),
        ..DtwSettings::default()
    });
    let result = banded.compare(&sweep(8), &sweep(64));
    assert!(result.normalized_distance.is_finite());
    assert!((0.0..=100.0).contains(&result.similarity));
}

#[test]
fn dissimilar_sequences_clamp_to_zero() {
    let aligner = SequenceAligner::new(DtwSettings {
        max_expected_distance: 0.05,
        ..DtwSettings::default()
    });
    let quiet = sequence(vec![vec![0.0, 0.0, 0.0]; 20]);
    let loud = sequence(vec![vec![50.0, -50.0, 50.0]; 20]);
    let result = aligner.compare(&quiet, &loud);
    assert_eq!(result.similarity, 0.0);
}
