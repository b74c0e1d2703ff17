//! Voice-activity-gated capture state machine.
//!
//! Reads fixed-size chunks from a [`CaptureSource`], tracks RMS energy, and
//! finalizes the utterance once trailing silence or the maximum duration is
//! reached. Cancellation is cooperative and returns the partial buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::audio::capture::CaptureSource;
use crate::config::VadSettings;
use crate::error::Result;
use crate::types::AudioBuffer;

const RECV_TIMEOUT: Duration = Duration::from_millis(50);
/// Consecutive empty polls after which the source is considered drained.
const STALL_POLL_LIMIT: usize = 40;

/// Capture session state, advanced once per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureState {
    Idle,
    Speaking,
    TrailingSilence,
    Finished,
    Cancelled,
}

/// Why the capture loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Trailing silence reached the configured duration.
    Silence,
    /// The hard duration cutoff fired.
    MaxDuration,
    /// The caller aborted; the partial buffer is still returned.
    Cancelled,
    /// The source stopped delivering chunks.
    SourceDrained,
}

#[derive(Debug)]
pub struct CaptureOutcome {
    pub buffer: AudioBuffer,
    pub state: CaptureState,
    pub reason: StopReason,
}

/// Cooperative cancellation handle shared with the capture loop.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct RecordingSession {
    state: CaptureState,
    samples: Vec<i16>,
    silent_chunks: usize,
    total_chunks: usize,
}

impl RecordingSession {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            samples: Vec::new(),
            silent_chunks: 0,
            total_chunks: 0,
        }
    }

    fn absorb(&mut self, chunk: &[f32], threshold: f64, chunks_per_silence: usize) {
        self.total_chunks += 1;
        self.samples.extend(
            chunk
                .iter()
                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
        );
        let loud = rms_energy(chunk) > threshold;
        self.state = match (self.state, loud) {
            (CaptureState::Idle, true) => CaptureState::Speaking,
            (CaptureState::Idle, false) => CaptureState::Idle,
            (CaptureState::Speaking, true) => CaptureState::Speaking,
            (CaptureState::Speaking, false) => {
                self.silent_chunks = 1;
                CaptureState::TrailingSilence
            }
            (CaptureState::TrailingSilence, true) => {
                self.silent_chunks = 0;
                CaptureState::Speaking
            }
            (CaptureState::TrailingSilence, false) => {
                self.silent_chunks += 1;
                if self.silent_chunks >= chunks_per_silence {
                    CaptureState::Finished
                } else {
                    CaptureState::TrailingSilence
                }
            }
            (terminal, _) => terminal,
        };
    }
}

/// Root-mean-square energy of a normalized chunk.
pub fn rms_energy(chunk: &[f32]) -> f64 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = chunk.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / chunk.len() as f64).sqrt()
}

#[derive(Debug, Clone, Default)]
pub struct VoiceActivityRecorder {
    settings: VadSettings,
}

impl VoiceActivityRecorder {
    pub fn new(settings: VadSettings) -> Self {
        Self { settings }
    }

    /// Runs the capture loop to completion.
    ///
    /// Blocking by design: there is exactly one capture in flight per
    /// session, and the buffer only transfers to the scoring pipeline once
    /// finalized. Fails only when the source cannot start (`DeviceError`).
    pub fn capture<C: CaptureSource>(
        &self,
        source: &mut C,
        cancel: &CancelToken,
    ) -> Result<CaptureOutcome> {
        self.settings.validate()?;
        let sample_rate = source.start()?;
        let chunks_per_silence = self.settings.chunks_per_silence(sample_rate);
        let max_chunks = self.settings.max_chunks(sample_rate);
        info!(
            sample_rate,
            chunks_per_silence, max_chunks, "voice-activity capture started"
        );

        let mut session = RecordingSession::new();
        let mut pending: Vec<f32> = Vec::with_capacity(self.settings.chunk_size * 2);
        let mut idle_polls = 0usize;
        let reason = loop {
            if cancel.is_cancelled() {
                session.state = CaptureState::Cancelled;
                break StopReason::Cancelled;
            }
            match source.recv_chunk(RECV_TIMEOUT) {
                Some(chunk) => {
                    idle_polls = 0;
                    pending.extend_from_slice(&chunk);
                }
                None => {
                    idle_polls += 1;
                    if idle_polls >= STALL_POLL_LIMIT {
                        break StopReason::SourceDrained;
                    }
                    continue;
                }
            }
            if let Some(reason) = self.drain_pending(
                &mut session,
                &mut pending,
                chunks_per_silence,
                max_chunks,
            ) {
                break reason;
            }
        };
        source.stop();

        if !matches!(
            session.state,
            CaptureState::Cancelled | CaptureState::Finished
        ) {
            session.state = CaptureState::Finished;
        }
        info!(
            chunks = session.total_chunks,
            samples = session.samples.len(),
            state = ?session.state,
            reason = ?reason,
            "capture finalized"
        );
        Ok(CaptureOutcome {
            buffer: AudioBuffer::mono(session.samples, sample_rate),
            state: session.state,
            reason,
        })
    }

    /// Feeds whole chunks from the pending sample queue into the session.
    fn drain_pending(
        &self,
        session: &mut RecordingSession,
        pending: &mut Vec<f32>,
        chunks_per_silence: usize,
        max_chunks: usize,
    ) -> Option<StopReason> {
        let chunk_size = self.settings.chunk_size;
        while pending.len() >= chunk_size {
            let chunk: Vec<f32> = pending.drain(..chunk_size).collect();
            session.absorb(&chunk, self.settings.silence_threshold, chunks_per_silence);
            if session.state == CaptureState::Finished {
                debug!(chunks = session.total_chunks, "trailing silence reached");
                return Some(StopReason::Silence);
            }
            if session.total_chunks >= max_chunks {
                debug!(chunks = session.total_chunks, "max duration reached");
                return Some(StopReason::MaxDuration);
            }
        }
        None
    }
}
