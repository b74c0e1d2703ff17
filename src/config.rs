//! Pipeline configuration with validation.

use crate::error::{AssessError, Result};

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Capture device selection.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub device_name: Option<String>,
    pub sample_rate: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_name: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Voice-activity detection parameters for the capture state machine.
#[derive(Debug, Clone)]
pub struct VadSettings {
    /// Samples per analysis chunk.
    pub chunk_size: usize,
    /// RMS level (normalized 0.0-1.0) below which a chunk counts as silent.
    pub silence_threshold: f64,
    /// Trailing silence that finalizes the utterance, in seconds.
    pub silence_duration_secs: f64,
    /// Hard cutoff for a single capture, in seconds.
    pub max_duration_secs: f64,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            silence_threshold: 0.015,
            silence_duration_secs: 1.2,
            max_duration_secs: 30.0,
        }
    }
}

impl VadSettings {
    /// Consecutive silent chunks required before the utterance finalizes.
    pub fn chunks_per_silence(&self, sample_rate: u32) -> usize {
        let per_second = sample_rate as f64 / self.chunk_size as f64;
        (per_second * self.silence_duration_secs).round().max(1.0) as usize
    }

    /// Chunk count at which capture stops regardless of state.
    pub fn max_chunks(&self, sample_rate: u32) -> usize {
        let per_second = sample_rate as f64 / self.chunk_size as f64;
        (per_second * self.max_duration_secs).ceil().max(1.0) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AssessError::InvalidConfig(
                "vad chunk_size must be positive".into(),
            ));
        }
        if self.silence_threshold <= 0.0 || self.silence_threshold >= 1.0 {
            return Err(AssessError::InvalidConfig(format!(
                "silence_threshold must be in (0, 1), got {}",
                self.silence_threshold
            )));
        }
        if self.silence_duration_secs <= 0.0 {
            return Err(AssessError::InvalidConfig(
                "silence_duration_secs must be positive".into(),
            ));
        }
        if self.max_duration_secs <= self.silence_duration_secs {
            return Err(AssessError::InvalidConfig(format!(
                "max_duration_secs ({}) must exceed silence_duration_secs ({})",
                self.max_duration_secs, self.silence_duration_secs
            )));
        }
        Ok(())
    }
}

/// Spectral feature extraction parameters.
#[derive(Debug, Clone)]
pub struct FeatureSettings {
    pub window_ms: usize,
    pub hop_ms: usize,
    /// Cepstral coefficients per frame; fixed across compared sequences.
    pub coefficients: usize,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            window_ms: 25,
            hop_ms: 10,
            coefficients: 13,
        }
    }
}

impl FeatureSettings {
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 || self.hop_ms == 0 {
            return Err(AssessError::InvalidConfig(
                "feature window and hop must be positive".into(),
            ));
        }
        if self.hop_ms > self.window_ms {
            return Err(AssessError::InvalidConfig(format!(
                "hop ({} ms) must not exceed window ({} ms)",
                self.hop_ms, self.window_ms
            )));
        }
        if self.coefficients == 0 {
            return Err(AssessError::InvalidConfig(
                "at least one cepstral coefficient is required".into(),
            ));
        }
        Ok(())
    }
}

/// Dynamic-time-warping parameters.
#[derive(Debug, Clone)]
pub struct DtwSettings {
    /// Sakoe-Chiba band half-width in frames. `None` searches the full
    /// alignment lattice; a band trades alignment precision for speed.
    pub band_radius: Option<usize>,
    /// Calibration constant: the per-step distance treated as "completely
    /// dissimilar" when mapping normalized distance to a 0-100 similarity.
    pub max_expected_distance: f64,
}

impl Default for DtwSettings {
    fn default() -> Self {
        Self {
            band_radius: None,
            max_expected_distance: 12.0,
        }
    }
}

impl DtwSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_expected_distance <= 0.0 {
            return Err(AssessError::InvalidConfig(
                "max_expected_distance must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct AssessConfig {
    pub capture: CaptureSettings,
    pub vad: VadSettings,
    pub features: FeatureSettings,
    pub dtw: DtwSettings,
}

impl AssessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capture.sample_rate == 0 {
            return Err(AssessError::InvalidConfig(
                "capture sample_rate must be positive".into(),
            ));
        }
        self.vad.validate()?;
        self.features.validate()?;
        self.dtw.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AssessConfig::default().validate().unwrap();
    }

    #[test]
    fn silence_chunk_count_rounds() {
        let vad = VadSettings {
            chunk_size: 1000,
            silence_duration_secs: 1.25,
            ..VadSettings::default()
        };
        // 16 chunks/sec * 1.25 s = 20
        assert_eq!(vad.chunks_per_silence(16_000), 20);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let vad = VadSettings {
            silence_threshold: 1.5,
            ..VadSettings::default()
        };
        assert!(vad.validate().is_err());
    }

    #[test]
    fn rejects_hop_wider_than_window() {
        let features = FeatureSettings {
            window_ms: 10,
            hop_ms: 25,
            ..FeatureSettings::default()
        };
        assert!(features.validate().is_err());
    }
}
