//! Raw capture path and permission gate

pub mod permissions;
pub mod source;
pub mod stream;

#[cfg(target_os = "macos")]
pub mod macos;

pub use permissions::{
    MicrophoneAuthorizer, PermissionGate, PermissionState, PermissionStatus, PlatformAuthorizer,
    MICROPHONE_ALIAS,
};
pub use source::{AudioChunkSink, AudioSource, CpalSourceProvider, SourceProvider};
pub use stream::{CaptureConfig, CaptureStatus, RawCapture};
