//! Acoustic feature extraction: PCM in, cepstral coefficient frames out.
//!
//! The spectral transform is delegated to the `aus` DSP primitives (STFT,
//! mel filterbank, MFCC). Extraction is deterministic for identical input;
//! all sequences that are compared against each other share one coefficient
//! count (the aligner requires equal vector dimensionality, not equal
//! length).

use ndarray::{Array1, Array2};

use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;

use crate::audio::resample;
use crate::config::FeatureSettings;
use crate::types::AudioBuffer;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;
const MEL_BANDS: usize = 40;
const MIN_FREQ: f64 = 20.0;

/// Fixed-rate sequence of feature vectors, one row per analysis frame.
/// Immutable after creation.
#[derive(Debug, Clone)]
pub struct FeatureSequence {
    pub frames: Array2<f32>,
    pub energy: Array1<f32>,
    pub coefficients: usize,
    pub hop_ms: usize,
}

impl FeatureSequence {
    pub fn empty(coefficients: usize, hop_ms: usize) -> Self {
        Self {
            frames: Array2::zeros((0, coefficients)),
            energy: Array1::zeros(0),
            coefficients,
            hop_ms,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Frame index range covering `[start_secs, end_secs)`, clamped to the
    /// sequence bounds. May be empty for spans outside the audio.
    pub fn frame_span(&self, start_secs: f64, end_secs: f64) -> std::ops::Range<usize> {
        let frames_per_sec = 1000.0 / self.hop_ms as f64;
        let start = ((start_secs * frames_per_sec).floor().max(0.0) as usize).min(self.frame_count());
        let end = ((end_secs * frames_per_sec).ceil().max(0.0) as usize).min(self.frame_count());
        start..end.max(start)
    }
}

/// Converts raw PCM into cepstral feature frames.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    settings: FeatureSettings,
}

impl FeatureExtractor {
    pub fn new(settings: FeatureSettings) -> Self {
        Self { settings }
    }

    /// Pure function of the buffer contents; empty or too-short audio
    /// produces an empty sequence rather than an error.
    pub fn extract(&self, buffer: &AudioBuffer) -> FeatureSequence {
        let mono = buffer.to_mono_f32();
        let at_rate = resample::to_rate(&mono, buffer.sample_rate, TARGET_SAMPLE_RATE);

        let fft_size = frame_samples(self.settings.window_ms);
        let hop_size = frame_samples(self.settings.hop_ms);
        if at_rate.len() < fft_size {
            return FeatureSequence::empty(self.settings.coefficients, self.settings.hop_ms);
        }

        let audio: Vec<f64> = at_rate.iter().map(|&s| s as f64).collect();
        let stft = spectrum::rstft(&audio, fft_size, hop_size, WindowType::Hanning);
        let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
        let power = analysis::make_power_spectrogram(&magnitude);

        let freqs = spectrum::rfftfreq(fft_size, TARGET_SAMPLE_RATE);
        let filterbank = MelFilterbank::new(
            MIN_FREQ,
            (TARGET_SAMPLE_RATE as f64) / 2.0,
            MEL_BANDS,
            &freqs,
            true,
        );
        let mel = analysis::mel::make_mel_spectrogram(&power, &filterbank);
        let mfcc = analysis::mel::mfcc_spectrogram(&mel, self.settings.coefficients, None);

        FeatureSequence {
            frames: matrix_from_rows(&mfcc, self.settings.coefficients),
            energy: frame_energies(&power),
            coefficients: self.settings.coefficients,
            hop_ms: self.settings.hop_ms,
        }
    }
}

fn frame_samples(millis: usize) -> usize {
    ((TARGET_SAMPLE_RATE as usize * millis) / 1000).max(1)
}

fn matrix_from_rows(rows: &[Vec<f64>], coefficients: usize) -> Array2<f32> {
    let mut flat = Vec::with_capacity(rows.len() * coefficients);
    for row in rows {
        for index in 0..coefficients {
            flat.push(row.get(index).copied().unwrap_or(0.0) as f32);
        }
    }
    Array2::from_shape_vec((rows.len(), coefficients), flat)
        .unwrap_or_else(|_| Array2::zeros((0, coefficients)))
}

fn frame_energies(power: &[Vec<f64>]) -> Array1<f32> {
    Array1::from_iter(
        power
            .iter()
            .map(|frame| frame.iter().sum::<f64>().sqrt() as f32),
    )
}
