//! WAV file loading and writing for reference clips and captured utterances.

use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::types::AudioBuffer;

/// Loads a WAV file, downmixing multi-channel audio to mono i16.
pub fn load(path: &Path) -> Result<AudioBuffer> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("failed to open WAV file {path:?}"))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<i16> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("failed to read PCM samples from {path:?}"))?,
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("failed to read float samples from {path:?}"))?,
    };

    let mono: Vec<i16> = interleaved
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect();

    Ok(AudioBuffer::mono(mono, spec.sample_rate))
}

/// Writes a buffer as 16-bit mono PCM.
pub fn write(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create WAV file {path:?}"))?;
    let mono = if buffer.channels <= 1 {
        buffer.samples.clone()
    } else {
        buffer
            .to_mono_f32()
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect()
    };
    for sample in mono {
        writer
            .write_sample(sample)
            .context("failed to write WAV sample")?;
    }
    writer.finalize().context("failed to finalize WAV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_reloads_mono_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let original = AudioBuffer::mono(vec![0, 1000, -1000, 32000], 16_000);

        write(&path, &original).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.sample_rate, 16_000);
        assert_eq!(loaded.samples, original.samples);
        assert_eq!(loaded.channels, 1);
    }
}
