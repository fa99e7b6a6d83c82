//! Recording state and bridge-facing value objects
//!
//! Defines the file-recording state machine, the fixed set of outcome tags,
//! and the result object handed back after a successful stop.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current state of the file recording path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderStatus {
    /// No clip session in flight
    #[default]
    Idle,
    /// A clip session is being written
    Recording,
}

/// Outcome tags shared with the host shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    RecordingStarted,
    MicrophonePermissionNotGranted,
    RecordingInProgress,
    NoRecordingInProgress,
    FailedToFetchRecording,
    CannotRecordOnThisPhone,
    DeviceUnavailable,
}

impl StatusMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            // Callers match on this exact string; the misspelling is part of
            // the public contract.
            StatusMessage::RecordingStarted => "RecordingStared",
            StatusMessage::MicrophonePermissionNotGranted => "MicrophonePermissionNotGranted",
            StatusMessage::RecordingInProgress => "RecordingInProgress",
            StatusMessage::NoRecordingInProgress => "NoRecordingInProgress",
            StatusMessage::FailedToFetchRecording => "FailedToFetchRecording",
            StatusMessage::CannotRecordOnThisPhone => "CannotRecordOnThisPhone",
            StatusMessage::DeviceUnavailable => "DeviceUnavailable",
        }
    }
}

/// Response for calls that resolve with a bare status tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
}

impl From<StatusMessage> for StatusResponse {
    fn from(message: StatusMessage) -> Self {
        Self {
            status: message.as_str().to_string(),
        }
    }
}

/// Result of a completed clip recording
///
/// Immutable once built; handed to the caller and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResult {
    /// Raw clip bytes as base64 text
    pub base64_string: String,

    /// Base64 data URI for direct playback
    pub data_url: String,

    /// Device-local file URI
    pub path: String,

    /// Host-portable URL served over the asset protocol
    pub web_path: String,

    /// Clip length in milliseconds
    pub duration: i64,

    /// File extension, including the dot
    pub format: String,

    /// Reported MIME type
    pub mime_type: String,
}

impl RecordingResult {
    pub const MIME_TYPE: &'static str = "audio/aac";
    pub const FORMAT: &'static str = ".m4a";

    /// Pure construction from the stop-time fields. No I/O.
    pub fn from_clip(bytes: &[u8], clip_path: &Path, duration_ms: i64) -> Self {
        let base64_string = BASE64.encode(bytes);
        let data_url = format!("data:{};base64,{}", Self::MIME_TYPE, base64_string);
        let absolute = clip_path.to_string_lossy();
        Self {
            path: format!("file://{}", absolute),
            web_path: format!("asset://localhost/{}", urlencoding::encode(&absolute)),
            base64_string,
            data_url,
            duration: duration_ms,
            format: Self::FORMAT.to_string(),
            mime_type: Self::MIME_TYPE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn start_tag_keeps_contract_spelling() {
        assert_eq!(StatusMessage::RecordingStarted.as_str(), "RecordingStared");
    }

    #[test]
    fn result_fields_from_clip() {
        let path = PathBuf::from("/tmp/clips/abc.m4a");
        let result = RecordingResult::from_clip(b"hello", &path, 1200);

        assert_eq!(result.base64_string, "aGVsbG8=");
        assert_eq!(result.data_url, "data:audio/aac;base64,aGVsbG8=");
        assert_eq!(result.path, "file:///tmp/clips/abc.m4a");
        assert!(result.web_path.starts_with("asset://localhost/"));
        assert_eq!(result.duration, 1200);
        assert_eq!(result.format, ".m4a");
        assert_eq!(result.mime_type, "audio/aac");
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = RecordingResult::from_clip(b"x", Path::new("/tmp/a.m4a"), 1);
        let value = serde_json::to_value(&result).unwrap();

        for key in [
            "base64String",
            "dataUrl",
            "path",
            "webPath",
            "duration",
            "format",
            "mimeType",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }
}
