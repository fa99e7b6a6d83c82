//! Clip recorder
//!
//! Owns the single in-flight clip session and the stop-time post-processing:
//! finalize the backend, read the clip back, base64-encode it, probe its
//! duration, and build the result object.

use crate::error::{Error, Result};
use crate::recorder::state::{RecorderStatus, RecordingResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Platform recorder seam.
///
/// The production implementation captures PCM with cpal and finalizes an AAC
/// clip with ffmpeg; tests substitute a synthetic backend.
#[async_trait]
pub trait ClipBackend: Send {
    /// Begin writing the clip at `path`.
    async fn start(&mut self, path: &Path) -> Result<()>;

    /// Stop capturing and finalize the file at the path given to `start`.
    async fn stop(&mut self) -> Result<()>;
}

/// Creates a fresh backend for each session.
pub trait ClipBackendFactory: Send + Sync {
    fn create(&self) -> Box<dyn ClipBackend>;
}

/// Media-duration probe seam.
///
/// Returns clip length in milliseconds, or -1 when the duration cannot be
/// resolved. Any negative value is treated as unknown.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration_ms(&self, path: &Path) -> i64;
}

struct ClipSession {
    path: PathBuf,
    started_at: DateTime<Utc>,
    backend: Box<dyn ClipBackend>,
}

/// File recording path: Idle -> Recording -> Idle.
///
/// Success and failure both return to Idle; the session is cleared before
/// any fallible post-processing runs.
pub struct ClipRecorder {
    session: Option<ClipSession>,
    factory: Box<dyn ClipBackendFactory>,
    probe: Box<dyn DurationProbe>,
    output_dir: PathBuf,
}

impl ClipRecorder {
    pub fn new(
        factory: Box<dyn ClipBackendFactory>,
        probe: Box<dyn DurationProbe>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            session: None,
            factory,
            probe,
            output_dir,
        }
    }

    pub fn status(&self) -> RecorderStatus {
        if self.session.is_some() {
            RecorderStatus::Recording
        } else {
            RecorderStatus::Idle
        }
    }

    /// Begin a new clip session.
    ///
    /// Rejects while a session is active, without touching it. A backend
    /// failure leaves the recorder Idle with no partial session retained.
    pub async fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::RecordingInProgress);
        }

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| Error::CannotRecord(e.to_string()))?;
        let path = self.output_dir.join(format!("{}.m4a", Uuid::new_v4()));

        let mut backend = self.factory.create();
        if let Err(e) = backend.start(&path).await {
            tracing::warn!("clip backend failed to start: {e}");
            return Err(Error::CannotRecord(e.to_string()));
        }

        tracing::info!("clip recording started: {:?}", path);
        self.session = Some(ClipSession {
            path,
            started_at: Utc::now(),
            backend,
        });
        Ok(())
    }

    /// Finalize the active session and return the recording result.
    ///
    /// On post-processing failure the clip file stays on disk; only the call
    /// fails.
    pub async fn stop(&mut self) -> Result<RecordingResult> {
        // Taking the session up front makes cleanup idempotent: whatever
        // happens below, the recorder ends up Idle.
        let mut session = self.session.take().ok_or(Error::NoRecordingInProgress)?;

        session
            .backend
            .stop()
            .await
            .map_err(|e| Error::FailedToFetchRecording(e.to_string()))?;

        let bytes = std::fs::read(&session.path)
            .map_err(|e| Error::FailedToFetchRecording(e.to_string()))?;
        if bytes.is_empty() {
            return Err(Error::FailedToFetchRecording("clip file is empty".into()));
        }

        let duration = self.probe.duration_ms(&session.path).await;
        if duration < 0 {
            return Err(Error::FailedToFetchRecording(
                "clip duration could not be resolved".into(),
            ));
        }

        let elapsed = Utc::now() - session.started_at;
        tracing::info!(
            "clip recording stopped after {}ms wall time: {} bytes, {}ms of audio",
            elapsed.num_milliseconds(),
            bytes.len(),
            duration
        );
        Ok(RecordingResult::from_clip(&bytes, &session.path, duration))
    }
}
