//! Audio input seams and the cpal-backed production source
//!
//! A cpal stream cannot move between threads, so sources are opened by a
//! `SourceProvider` *on* the capture worker thread and live there until the
//! loop ends.

use crate::capture::stream::CaptureConfig;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::time::Duration;

/// One opened input handle. Lives entirely on the capture worker thread.
pub trait AudioSource {
    /// Blocking read of the next buffer as 16-bit little-endian PCM bytes.
    ///
    /// `Ok(None)` means the timeout elapsed with no data; the loop re-checks
    /// its stop flag and retries.
    fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

/// Opens audio sources for the capture worker.
pub trait SourceProvider: Send + Sync {
    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn AudioSource>>;
}

/// Receives each captured buffer, in read order.
pub trait AudioChunkSink: Send + 'static {
    fn on_chunk(&self, chunk: &[u8]);

    fn on_silence(&self) {}
}

/// Production provider using the default cpal input device.
pub struct CpalSourceProvider;

struct CpalSource {
    rx: mpsc::Receiver<Vec<u8>>,
    // Held so the stream keeps capturing until the source is dropped.
    _stream: cpal::Stream,
}

impl AudioSource for CpalSource {
    fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::DeviceUnavailable(
                "audio stream stopped producing data".into(),
            )),
        }
    }
}

impl SourceProvider for CpalSourceProvider {
    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn AudioSource>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".into()))?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            // Platform-computed minimum for the configuration.
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::channel();
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let mut bytes = Vec::with_capacity(data.len() * 2);
                    for sample in data {
                        bytes.extend_from_slice(&sample.to_le_bytes());
                    }
                    let _ = tx.send(bytes);
                },
                |err| tracing::error!("audio input stream error: {err}"),
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        tracing::info!(
            "audio input opened: {} Hz, {} channels, 16-bit PCM",
            config.sample_rate,
            config.channels
        );
        Ok(Box::new(CpalSource { rx, _stream: stream }))
    }
}
