//! Raw capture path
//!
//! Owns the capture worker: read one buffer, notify the sink, append the
//! bytes to the session PCM file, repeat until disabled. The device paces
//! the loop; there is no queueing between reads.

use crate::capture::source::{AudioChunkSink, AudioSource, SourceProvider};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use uuid::Uuid;

/// Fixed input configuration for the raw path.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Interleaved channel count
    pub channels: u16,

    /// Directory receiving the per-session PCM files
    pub output_dir: PathBuf,
}

impl CaptureConfig {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            output_dir,
        }
    }
}

/// Current state of the raw capture path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Streaming,
}

const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Raw microphone capture: Idle -> Streaming -> Idle.
pub struct RawCapture {
    provider: Arc<dyn SourceProvider>,
    config: CaptureConfig,
    status: Arc<RwLock<CaptureStatus>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    output_path: Option<PathBuf>,
}

impl RawCapture {
    pub fn new(provider: Arc<dyn SourceProvider>, config: CaptureConfig) -> Self {
        Self {
            provider,
            config,
            status: Arc::new(RwLock::new(CaptureStatus::Idle)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            output_path: None,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        *self.status.read()
    }

    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// Path of the current (or most recent) session's PCM file.
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Open the input device and start the capture loop.
    ///
    /// Returns once the device is confirmed open; a failed open surfaces as
    /// `DeviceUnavailable` and leaves the path idle. When `recording_enabled`
    /// is false, buffers are forwarded to the sink but not written to disk.
    pub fn enable(
        &mut self,
        sink: Box<dyn AudioChunkSink>,
        recording_enabled: bool,
        silence_detection: bool,
    ) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::RecordingInProgress);
        }

        // Each session gets its own file so earlier captures survive.
        let path = self
            .config
            .output_dir
            .join(format!("capture-{}.pcm", Uuid::new_v4()));

        self.stop.store(false, Ordering::Relaxed);
        let provider = self.provider.clone();
        let config = self.config.clone();
        let stop = self.stop.clone();
        let status = self.status.clone();
        let worker_path = path.clone();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = std::thread::spawn(move || {
            let mut source = match provider.open(&config) {
                Ok(source) => source,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            *status.write() = CaptureStatus::Streaming;
            run_capture_loop(
                source.as_mut(),
                sink.as_ref(),
                &worker_path,
                &stop,
                recording_enabled,
                silence_detection,
                &config,
            );
            *status.write() = CaptureStatus::Idle;
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                tracing::error!("failed to open audio input: {e}");
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(Error::DeviceUnavailable(
                    "capture worker exited before the device opened".into(),
                ));
            }
        }

        tracing::info!("raw capture enabled, session file {:?}", path);
        self.output_path = Some(path);
        self.worker = Some(worker);
        Ok(())
    }

    /// Stop the loop and release the device. No-op when idle.
    ///
    /// Cancellation is cooperative: up to one in-flight read/notify/write
    /// completes after the flag is set.
    pub fn disable(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stop.store(true, Ordering::Relaxed);
            let _ = worker.join();
            tracing::info!("raw capture disabled");
        }
    }
}

impl Drop for RawCapture {
    fn drop(&mut self) {
        self.disable();
    }
}

fn run_capture_loop(
    source: &mut dyn AudioSource,
    sink: &dyn AudioChunkSink,
    path: &Path,
    stop: &AtomicBool,
    recording_enabled: bool,
    silence_detection: bool,
    config: &CaptureConfig,
) {
    let mut file = if recording_enabled {
        match File::create(path) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::error!("failed to create capture file {:?}: {e}", path);
                None
            }
        }
    } else {
        None
    };

    let mut detector =
        silence_detection.then(|| SilenceDetector::new(config.sample_rate, config.channels));

    while !stop.load(Ordering::Relaxed) {
        let chunk = match source.read(READ_TIMEOUT) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("audio source failed mid-stream: {e}");
                break;
            }
        };

        // Buffer N is notified and written before buffer N+1 is read.
        sink.on_chunk(&chunk);
        if let Some(file) = file.as_mut() {
            // A stalled write must not tear down the stream; listeners keep
            // receiving buffers.
            if let Err(e) = file.write_all(&chunk) {
                tracing::warn!("capture file write failed: {e}");
            }
        }
        if let Some(detector) = detector.as_mut() {
            if detector.feed(&chunk) {
                sink.on_silence();
            }
        }
    }

    if let Some(mut file) = file.take() {
        if let Err(e) = file.flush() {
            tracing::warn!("failed to flush capture file: {e}");
        }
    }
}

const SILENCE_THRESHOLD_DBFS: f64 = -35.0;
const MIN_QUIET_BUFFERS: u32 = 3;
const MIN_QUIET_SECS: f64 = 1.0;

/// Flags sustained runs of near-silent audio.
///
/// Buffers are 16-bit little-endian interleaved PCM. A buffer counts as
/// quiet when its RMS falls under -35 dBFS; once more than three consecutive
/// quiet buffers cover at least a second of audio, the detector fires and
/// re-arms.
struct SilenceDetector {
    sample_rate: u32,
    channels: u16,
    quiet_buffers: u32,
    quiet_samples: u64,
}

impl SilenceDetector {
    fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            quiet_buffers: 0,
            quiet_samples: 0,
        }
    }

    fn feed(&mut self, chunk: &[u8]) -> bool {
        if rms_dbfs(chunk) < SILENCE_THRESHOLD_DBFS {
            self.quiet_buffers += 1;
            self.quiet_samples += (chunk.len() / 2) as u64;
        } else {
            self.quiet_buffers = 0;
            self.quiet_samples = 0;
        }

        let quiet_secs =
            self.quiet_samples as f64 / (self.sample_rate as f64 * self.channels.max(1) as f64);
        if self.quiet_buffers > MIN_QUIET_BUFFERS && quiet_secs >= MIN_QUIET_SECS {
            self.quiet_buffers = 0;
            self.quiet_samples = 0;
            return true;
        }
        false
    }
}

fn rms_dbfs(chunk: &[u8]) -> f64 {
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;
    for pair in chunk.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64 / i16::MAX as f64;
        sum_sq += sample * sample;
        count += 1;
    }
    if count == 0 {
        return f64::NEG_INFINITY;
    }
    let rms = (sum_sq / count as f64).sqrt();
    if rms <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}
