//! Command handlers exposed to the webview
//!
//! Each handler delegates to `MicrophoneState`, which locks the relevant
//! path, applies the permission gate where audio is about to flow, and maps
//! outcomes onto the documented status strings.

use crate::capture::{
    AudioChunkSink, CpalSourceProvider, PermissionGate, PermissionStatus, PlatformAuthorizer,
    RawCapture,
};
use crate::error::{Error, Result};
use crate::recorder::{
    ClipRecorder, CpalClipBackendFactory, FfprobeDurationProbe, RecordingResult, StatusMessage,
    StatusResponse,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Runtime, State};
use tokio::sync::Mutex;

/// Event carrying one captured buffer of 16-bit LE PCM bytes.
pub const AUDIO_DATA_EVENT: &str = "audioDataReceived";

/// Event fired when sustained silence is detected on the raw path.
pub const SILENCE_EVENT: &str = "silenceDetected";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunkPayload {
    pub audio_data: Vec<u8>,
}

/// Plugin state managed by the host application.
///
/// Each capture path sits behind its own async mutex so concurrent webview
/// calls serialize instead of racing the session checks.
pub struct MicrophoneState {
    gate: PermissionGate,
    raw: Arc<Mutex<RawCapture>>,
    recorder: Arc<Mutex<ClipRecorder>>,
}

impl MicrophoneState {
    pub fn new(config: &crate::Config, cache_dir: PathBuf) -> Self {
        let gate = PermissionGate::new(
            Arc::new(PlatformAuthorizer),
            &config.declared_permissions,
        );
        let raw = RawCapture::new(
            Arc::new(CpalSourceProvider),
            crate::capture::CaptureConfig::new(cache_dir.clone()),
        );
        let recorder = ClipRecorder::new(
            Box::new(CpalClipBackendFactory),
            Box::new(FfprobeDurationProbe),
            cache_dir,
        );
        Self::with_parts(gate, raw, recorder)
    }

    fn with_parts(gate: PermissionGate, raw: RawCapture, recorder: ClipRecorder) -> Self {
        Self {
            gate,
            raw: Arc::new(Mutex::new(raw)),
            recorder: Arc::new(Mutex::new(recorder)),
        }
    }

    pub fn check_permissions(&self) -> PermissionStatus {
        self.gate.check()
    }

    pub fn request_permissions(&self, requested: Option<&[String]>) -> PermissionStatus {
        self.gate.request(requested)
    }

    /// Gate, then open the raw path. A denied permission rejects before any
    /// device handle is touched.
    pub async fn enable_raw(
        &self,
        sink: Box<dyn AudioChunkSink>,
        recording_enabled: bool,
        silence_detection: bool,
    ) -> Result<StatusResponse> {
        if !self.gate.is_granted() {
            return Err(Error::PermissionNotGranted);
        }

        let mut raw = self.raw.lock().await;
        raw.enable(sink, recording_enabled, silence_detection)?;
        Ok(StatusMessage::RecordingStarted.into())
    }

    pub async fn disable_raw(&self) {
        self.raw.lock().await.disable();
    }

    /// Gate, then begin a clip session.
    pub async fn start_clip(&self) -> Result<StatusResponse> {
        if !self.gate.is_granted() {
            return Err(Error::PermissionNotGranted);
        }

        let mut recorder = self.recorder.lock().await;
        recorder.start().await?;
        Ok(StatusMessage::RecordingStarted.into())
    }

    pub async fn stop_clip(&self) -> Result<RecordingResult> {
        let mut recorder = self.recorder.lock().await;
        recorder.stop().await
    }
}

/// Sink forwarding captured buffers to the webview as events.
struct EmitterSink<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> AudioChunkSink for EmitterSink<R> {
    fn on_chunk(&self, chunk: &[u8]) {
        let payload = AudioChunkPayload {
            audio_data: chunk.to_vec(),
        };
        if let Err(e) = self.app.emit(AUDIO_DATA_EVENT, payload) {
            tracing::warn!("failed to emit audio data event: {e}");
        }
    }

    fn on_silence(&self) {
        if let Err(e) = self.app.emit(SILENCE_EVENT, serde_json::json!({})) {
            tracing::warn!("failed to emit silence event: {e}");
        }
    }
}

#[tauri::command]
pub async fn check_permissions(state: State<'_, MicrophoneState>) -> Result<PermissionStatus> {
    Ok(state.check_permissions())
}

#[tauri::command]
pub async fn request_permissions(
    state: State<'_, MicrophoneState>,
    permissions: Option<Vec<String>>,
) -> Result<PermissionStatus> {
    Ok(state.request_permissions(permissions.as_deref()))
}

#[tauri::command]
pub async fn enable_microphone<R: Runtime>(
    app: AppHandle<R>,
    state: State<'_, MicrophoneState>,
    recording_enabled: bool,
    silence_detection: bool,
) -> Result<StatusResponse> {
    state
        .enable_raw(
            Box::new(EmitterSink { app }),
            recording_enabled,
            silence_detection,
        )
        .await
}

#[tauri::command]
pub async fn disable_microphone(state: State<'_, MicrophoneState>) -> Result<()> {
    state.disable_raw().await;
    Ok(())
}

#[tauri::command]
pub async fn start_recording(state: State<'_, MicrophoneState>) -> Result<StatusResponse> {
    state.start_clip().await
}

#[tauri::command]
pub async fn stop_recording(state: State<'_, MicrophoneState>) -> Result<RecordingResult> {
    state.stop_clip().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        AudioSource, CaptureConfig, MicrophoneAuthorizer, PermissionState, SourceProvider,
        MICROPHONE_ALIAS,
    };
    use crate::recorder::{ClipBackend, ClipBackendFactory, DurationProbe};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAuthorizer(PermissionState);

    impl MicrophoneAuthorizer for FixedAuthorizer {
        fn check(&self) -> PermissionState {
            self.0
        }

        fn request(&self) -> PermissionState {
            self.0
        }
    }

    /// Provider that records whether the device was ever opened.
    struct CountingProvider {
        opens: Arc<AtomicUsize>,
    }

    impl SourceProvider for CountingProvider {
        fn open(&self, _config: &CaptureConfig) -> crate::Result<Box<dyn AudioSource>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Err(Error::DeviceUnavailable("no device in tests".into()))
        }
    }

    struct CountingFactory {
        starts: Arc<AtomicUsize>,
    }

    struct CountingBackend {
        starts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ClipBackend for CountingBackend {
        async fn start(&mut self, _path: &Path) -> crate::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Err(Error::DeviceUnavailable("no device in tests".into()))
        }

        async fn stop(&mut self) -> crate::Result<()> {
            Ok(())
        }
    }

    impl ClipBackendFactory for CountingFactory {
        fn create(&self) -> Box<dyn ClipBackend> {
            Box::new(CountingBackend {
                starts: self.starts.clone(),
            })
        }
    }

    struct NullProbe;

    #[async_trait]
    impl DurationProbe for NullProbe {
        async fn duration_ms(&self, _path: &Path) -> i64 {
            -1
        }
    }

    struct NullSink;

    impl AudioChunkSink for NullSink {
        fn on_chunk(&self, _chunk: &[u8]) {}
    }

    fn denied_state(dir: &Path) -> (MicrophoneState, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let starts = Arc::new(AtomicUsize::new(0));
        let gate = PermissionGate::new(
            Arc::new(FixedAuthorizer(PermissionState::Denied)),
            &[MICROPHONE_ALIAS.to_string()],
        );
        let raw = RawCapture::new(
            Arc::new(CountingProvider {
                opens: opens.clone(),
            }),
            CaptureConfig::new(dir.to_path_buf()),
        );
        let recorder = ClipRecorder::new(
            Box::new(CountingFactory {
                starts: starts.clone(),
            }),
            Box::new(NullProbe),
            dir.to_path_buf(),
        );
        (
            MicrophoneState::with_parts(gate, raw, recorder),
            opens,
            starts,
        )
    }

    #[tokio::test]
    async fn denied_permission_rejects_enable_without_opening_device() {
        let dir = tempfile::tempdir().unwrap();
        let (state, opens, _) = denied_state(dir.path());

        let err = state
            .enable_raw(Box::new(NullSink), true, false)
            .await
            .unwrap_err();
        assert_eq!(err.status_tag(), "MicrophonePermissionNotGranted");
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denied_permission_rejects_start_recording_without_starting_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _, starts) = denied_state(dir.path());

        let err = state.start_clip().await.unwrap_err();
        assert_eq!(err.status_tag(), "MicrophonePermissionNotGranted");
        assert_eq!(starts.load(Ordering::SeqCst), 0);
    }
}
