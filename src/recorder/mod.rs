//! File recording path
//!
//! One bounded start -> stop clip session at a time, finalized to an AAC
//! clip and returned as base64 plus metadata.

pub mod clip;
pub mod encoder;
pub mod state;

pub use clip::{ClipBackend, ClipBackendFactory, ClipRecorder, DurationProbe};
pub use encoder::{CpalClipBackendFactory, FfprobeDurationProbe};
pub use state::{RecorderStatus, RecordingResult, StatusMessage, StatusResponse};
