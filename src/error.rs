//! Plugin error type
//!
//! Every failure maps to exactly one of the documented status tags; the tag
//! string is what crosses the bridge, with details kept in the log.

use crate::recorder::StatusMessage;
use serde::{Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("microphone permission not granted")]
    PermissionNotGranted,

    #[error("a recording session is already active")]
    RecordingInProgress,

    #[error("no recording session is active")]
    NoRecordingInProgress,

    #[error("cannot record on this device: {0}")]
    CannotRecord(String),

    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("failed to fetch recording: {0}")]
    FailedToFetchRecording(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The outcome tag for this failure. Tag strings live in one place,
    /// on [`StatusMessage`].
    pub fn status_message(&self) -> StatusMessage {
        match self {
            Error::PermissionNotGranted => StatusMessage::MicrophonePermissionNotGranted,
            Error::RecordingInProgress => StatusMessage::RecordingInProgress,
            Error::NoRecordingInProgress => StatusMessage::NoRecordingInProgress,
            Error::CannotRecord(_) => StatusMessage::CannotRecordOnThisPhone,
            Error::DeviceUnavailable(_) => StatusMessage::DeviceUnavailable,
            Error::FailedToFetchRecording(_) | Error::Io(_) => StatusMessage::FailedToFetchRecording,
        }
    }

    /// The status tag callers match on.
    pub fn status_tag(&self) -> &'static str {
        self.status_message().as_str()
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.status_tag())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_failure_maps_to_one_tag() {
        assert_eq!(
            Error::PermissionNotGranted.status_tag(),
            "MicrophonePermissionNotGranted"
        );
        assert_eq!(Error::RecordingInProgress.status_tag(), "RecordingInProgress");
        assert_eq!(
            Error::NoRecordingInProgress.status_tag(),
            "NoRecordingInProgress"
        );
        assert_eq!(
            Error::CannotRecord("x".into()).status_tag(),
            "CannotRecordOnThisPhone"
        );
        assert_eq!(
            Error::DeviceUnavailable("x".into()).status_tag(),
            "DeviceUnavailable"
        );
        assert_eq!(
            Error::FailedToFetchRecording("x".into()).status_tag(),
            "FailedToFetchRecording"
        );
        assert_eq!(
            Error::from(std::io::Error::other("x")).status_tag(),
            "FailedToFetchRecording"
        );
    }

    #[test]
    fn serializes_as_bare_tag() {
        let json = serde_json::to_string(&Error::PermissionNotGranted).unwrap();
        assert_eq!(json, "\"MicrophonePermissionNotGranted\"");
    }
}
