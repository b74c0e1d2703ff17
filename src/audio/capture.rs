//! Microphone capture behind a swappable chunk source.
//!
//! The recorder consumes audio through [`CaptureSource`] so the capture state
//! machine can be driven by a live cpal stream in production and by canned
//! chunks in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig};
use tracing::{error, info};

use crate::config::CaptureSettings;
use crate::error::{AssessError, Result};

const CHANNEL_CHUNK_CAPACITY: usize = 32;

/// Source of normalized mono f32 chunks feeding the recorder loop.
pub trait CaptureSource {
    /// Opens the source and returns the delivered sample rate.
    fn start(&mut self) -> Result<u32>;
    /// Blocks up to `timeout` for the next chunk; `None` on timeout or when
    /// the source is drained.
    fn recv_chunk(&mut self, timeout: Duration) -> Option<Vec<f32>>;
    fn stop(&mut self);
}

/// Live microphone input via the default (or named) cpal device.
pub struct LiveCaptureSource {
    settings: CaptureSettings,
    active: Option<ActiveStream>,
}

struct ActiveStream {
    stream: Stream,
    receiver: Receiver<Vec<f32>>,
    stopped: Arc<AtomicBool>,
}

impl LiveCaptureSource {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            active: None,
        }
    }
}

impl CaptureSource for LiveCaptureSource {
    fn start(&mut self) -> Result<u32> {
        let device = select_device(self.settings.device_name.as_deref())?;
        let supported = device
            .default_input_config()
            .map_err(|err| AssessError::Device(format!("no usable input config: {err}")))?;
        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: BufferSize::Default,
        };
        let (sender, receiver) = mpsc::sync_channel(CHANNEL_CHUNK_CAPACITY);
        let stopped = Arc::new(AtomicBool::new(false));
        let stream = build_input_stream(
            &device,
            &stream_config,
            supported.sample_format(),
            sender,
            stopped.clone(),
        )?;
        stream
            .play()
            .map_err(|err| AssessError::Device(format!("failed to start stream: {err}")))?;
        let sample_rate = stream_config.sample_rate.0;
        info!(
            device = ?self.settings.device_name,
            sample_rate,
            channels = stream_config.channels,
            "capture stream started"
        );
        self.active = Some(ActiveStream {
            stream,
            receiver,
            stopped,
        });
        Ok(sample_rate)
    }

    fn recv_chunk(&mut self, timeout: Duration) -> Option<Vec<f32>> {
        let active = self.active.as_ref()?;
        match active.receiver.recv_timeout(timeout) {
            Ok(chunk) => Some(chunk),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stopped.store(true, Ordering::SeqCst);
            let _ = active.stream.pause();
        }
    }
}

impl Drop for LiveCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn select_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()
            .map_err(|err| AssessError::Device(format!("listing input devices failed: {err}")))?
            .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AssessError::Device(format!("input device '{wanted}' not found"))),
        None => host
            .default_input_device()
            .ok_or_else(|| AssessError::Device("no default input device available".into())),
    }
}

fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    format: SampleFormat,
    sender: SyncSender<Vec<f32>>,
    stopped: Arc<AtomicBool>,
) -> Result<Stream> {
    let err_fn = |err| error!(error = %err, "audio input stream error");
    let channels = config.channels as usize;
    let result = match format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            {
                let sender = sender.clone();
                let stopped = stopped.clone();
                move |data: &[f32], _| forward_frames(data.to_vec(), channels, &sender, &stopped)
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            {
                let sender = sender.clone();
                let stopped = stopped.clone();
                move |data: &[i16], _| {
                    let normalized = data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    forward_frames(normalized, channels, &sender, &stopped)
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            config,
            {
                let sender = sender.clone();
                let stopped = stopped.clone();
                move |data: &[u16], _| {
                    let normalized = data
                        .iter()
                        .map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
                        .collect();
                    forward_frames(normalized, channels, &sender, &stopped)
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AssessError::Device(format!(
                "unsupported input sample format {other:?}"
            )))
        }
    };
    result.map_err(|err| AssessError::Device(format!("failed to build input stream: {err}")))
}

fn forward_frames(
    data: Vec<f32>,
    channels: usize,
    sender: &SyncSender<Vec<f32>>,
    stopped: &Arc<AtomicBool>,
) {
    if stopped.load(Ordering::Relaxed) || channels == 0 {
        return;
    }
    let mono: Vec<f32> = data.chunks(channels).map(mix_to_mono).collect();
    // The audio callback must never block; a full channel drops the chunk.
    let _ = sender.try_send(mono);
}

pub fn mix_to_mono(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    frame.iter().sum::<f32>() / frame.len() as f32
}

/// Deterministic capture source for tests: replays prepared chunks.
pub struct MockCapture {
    sample_rate: u32,
    chunks: std::collections::VecDeque<Vec<f32>>,
    started: bool,
}

impl MockCapture {
    pub fn new(sample_rate: u32, chunks: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            chunks: chunks.into(),
            started: false,
        }
    }

    /// Splits a sample stream into fixed-size chunks.
    pub fn from_samples(sample_rate: u32, samples: &[f32], chunk_len: usize) -> Self {
        let chunks = if chunk_len == 0 {
            vec![samples.to_vec()]
        } else {
            samples.chunks(chunk_len).map(<[f32]>::to_vec).collect()
        };
        Self::new(sample_rate, chunks)
    }
}

impl CaptureSource for MockCapture {
    fn start(&mut self) -> Result<u32> {
        self.started = true;
        Ok(self.sample_rate)
    }

    fn recv_chunk(&mut self, _timeout: Duration) -> Option<Vec<f32>> {
        if !self.started {
            return None;
        }
        self.chunks.pop_front()
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_mixdown_averages_frame() {
        assert!((mix_to_mono(&[0.8, 0.2]) - 0.5).abs() < 1e-6);
        assert_eq!(mix_to_mono(&[]), 0.0);
    }

    #[test]
    fn mock_capture_replays_chunks_in_order() {
        let mut mock = MockCapture::from_samples(16_000, &[0.1, 0.2, 0.3, 0.4], 2);
        assert!(mock.recv_chunk(Duration::ZERO).is_none());
        mock.start().unwrap();
        assert_eq!(mock.recv_chunk(Duration::ZERO), Some(vec![0.1, 0.2]));
        assert_eq!(mock.recv_chunk(Duration::ZERO), Some(vec![0.3, 0.4]));
        assert!(mock.recv_chunk(Duration::ZERO).is_none());
    }
}
