//! Production clip backend and duration probe
//!
//! Captures microphone PCM with cpal, stages it as a WAV file, and finalizes
//! it to AAC in an M4A container with an ffmpeg subprocess. Duration is
//! resolved by probing the finished clip with ffprobe.

use crate::error::{Error, Result};
use crate::recorder::clip::{ClipBackend, ClipBackendFactory, DurationProbe};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

type SharedWavWriter = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Clip backend recording through the default cpal input device.
pub struct CpalClipBackend {
    clip_path: Option<PathBuf>,
    wav_path: Option<PathBuf>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl CpalClipBackend {
    pub fn new() -> Self {
        Self {
            clip_path: None,
            wav_path: None,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl Default for CpalClipBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClipBackend for CpalClipBackend {
    async fn start(&mut self, path: &Path) -> Result<()> {
        let wav_path = path.with_extension("wav");
        self.stop.store(false, Ordering::Relaxed);

        let stop = self.stop.clone();
        let worker_wav = wav_path.clone();
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = std::thread::spawn(move || record_wav(&worker_wav, &stop, ready_tx));

        // Block until the device is confirmed open, so a failed open rejects
        // the start call instead of producing an empty clip later.
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(Error::DeviceUnavailable(
                    "recorder worker exited before the device opened".into(),
                ));
            }
        }

        self.clip_path = Some(path.to_path_buf());
        self.wav_path = Some(wav_path);
        self.worker = Some(worker);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| Error::CannotRecord("recorder worker panicked".into()))??;
        }

        let wav_path = self
            .wav_path
            .take()
            .ok_or_else(|| Error::CannotRecord("backend was never started".into()))?;
        let clip_path = self
            .clip_path
            .take()
            .ok_or_else(|| Error::CannotRecord("backend was never started".into()))?;

        transcode_to_m4a(&wav_path, &clip_path)?;

        // The WAV staging file is only an intermediate.
        if let Err(e) = std::fs::remove_file(&wav_path) {
            tracing::warn!("failed to remove staging file {:?}: {e}", wav_path);
        }
        Ok(())
    }
}

pub struct CpalClipBackendFactory;

impl ClipBackendFactory for CpalClipBackendFactory {
    fn create(&self) -> Box<dyn ClipBackend> {
        Box::new(CpalClipBackend::new())
    }
}

/// Capture from the default input device into a 16-bit WAV file until the
/// stop flag is set. Open success or failure is reported over `ready_tx`
/// before the loop begins.
fn record_wav(
    path: &Path,
    stop: &AtomicBool,
    ready_tx: mpsc::Sender<Result<()>>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(Error::DeviceUnavailable(
                "no input device available".into(),
            )));
            return Ok(());
        }
    };
    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(Error::DeviceUnavailable(e.to_string())));
            return Ok(());
        }
    };

    let spec = WavSpec {
        channels: supported.channels(),
        sample_rate: supported.sample_rate().0,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let writer: SharedWavWriter = match WavWriter::create(path, spec) {
        Ok(writer) => Arc::new(Mutex::new(Some(writer))),
        Err(e) => {
            let _ = ready_tx.send(Err(Error::CannotRecord(e.to_string())));
            return Ok(());
        }
    };

    let err_fn = |err| tracing::error!("clip input stream error: {err}");
    let stream_config: cpal::StreamConfig = supported.config();

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let writer = writer.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    write_samples(&writer, data.iter().map(|&s| {
                        (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                    }));
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let writer = writer.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    write_samples(&writer, data.iter().copied());
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let writer = writer.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    write_samples(&writer, data.iter().map(|&s| (s as i32 - 0x8000) as i16));
                },
                err_fn,
                None,
            )
        }
        other => {
            let _ = ready_tx.send(Err(Error::DeviceUnavailable(format!(
                "unsupported sample format: {other:?}"
            ))));
            return Ok(());
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(Error::DeviceUnavailable(e.to_string())));
            return Ok(());
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::DeviceUnavailable(e.to_string())));
        return Ok(());
    }

    let _ = ready_tx.send(Ok(()));
    tracing::info!(
        "clip capture running: {} Hz, {} channels",
        spec.sample_rate,
        spec.channels
    );

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }
    drop(stream);

    let writer = writer
        .lock()
        .map_err(|_| Error::CannotRecord("wav writer lock poisoned".into()))?
        .take();
    if let Some(writer) = writer {
        writer
            .finalize()
            .map_err(|e| Error::CannotRecord(e.to_string()))?;
    }
    Ok(())
}

fn write_samples(writer: &SharedWavWriter, samples: impl Iterator<Item = i16>) {
    if let Ok(mut guard) = writer.lock() {
        if let Some(writer) = guard.as_mut() {
            for sample in samples {
                if writer.write_sample(sample).is_err() {
                    return;
                }
            }
        }
    }
}

/// Encode the staged WAV into AAC audio in an M4A container.
fn transcode_to_m4a(wav_path: &Path, clip_path: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args([
            "-y",
            "-i",
            wav_path.to_str().unwrap_or(""),
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            clip_path.to_str().unwrap_or(""),
        ])
        .output()
        .map_err(|e| Error::CannotRecord(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::FailedToFetchRecording(format!(
            "ffmpeg failed: {stderr}"
        )));
    }
    Ok(())
}

/// Duration probe backed by ffprobe.
pub struct FfprobeDurationProbe;

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration_ms(&self, path: &Path) -> i64 {
        let output = match Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                path.to_str().unwrap_or(""),
            ])
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("failed to run ffprobe: {e}");
                return -1;
            }
        };

        if !output.status.success() {
            tracing::warn!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return -1;
        }

        parse_duration_ms(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract `format.duration` from ffprobe JSON output as integer
/// milliseconds; -1 when absent or malformed.
fn parse_duration_ms(json_str: &str) -> i64 {
    let json: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(_) => return -1,
    };

    json.get("format")
        .and_then(|format| format.get("duration"))
        .and_then(|duration| duration.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0).round() as i64)
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_from_ffprobe_output() {
        let json = r#"{"format":{"filename":"a.m4a","duration":"1.234","size":"512"}}"#;
        assert_eq!(parse_duration_ms(json), 1234);
    }

    #[test]
    fn rounds_fractional_milliseconds() {
        let json = r#"{"format":{"duration":"0.0006"}}"#;
        assert_eq!(parse_duration_ms(json), 1);
    }

    #[test]
    fn missing_duration_yields_sentinel() {
        assert_eq!(parse_duration_ms(r#"{"format":{}}"#), -1);
        assert_eq!(parse_duration_ms(r#"{}"#), -1);
    }

    #[test]
    fn malformed_output_yields_sentinel() {
        assert_eq!(parse_duration_ms("not json"), -1);
        assert_eq!(parse_duration_ms(r#"{"format":{"duration":"abc"}}"#), -1);
    }
}
