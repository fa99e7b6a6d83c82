//! macOS permission handling
//!
//! Microphone authorization goes through AVCaptureDevice.

use block2::RcBlock;
use objc2_av_foundation::{AVAuthorizationStatus, AVCaptureDevice, AVMediaType, AVMediaTypeAudio};
use std::sync::mpsc;

fn audio_media_type() -> Option<&'static AVMediaType> {
    unsafe { AVMediaTypeAudio }
}

/// Check if microphone permission is granted
pub fn has_microphone_permission() -> bool {
    let Some(media_type) = audio_media_type() else {
        return false;
    };
    unsafe {
        AVCaptureDevice::authorizationStatusForMediaType(media_type)
            == AVAuthorizationStatus::Authorized
    }
}

/// Request microphone permission
///
/// Prompts the user on first call and blocks until they answer. Returns true
/// if permission ended up granted.
pub fn request_microphone_permission() -> bool {
    if has_microphone_permission() {
        return true;
    }
    let Some(media_type) = audio_media_type() else {
        return false;
    };

    let (tx, rx) = mpsc::channel();
    unsafe {
        let handler = RcBlock::new(move |granted: objc2::runtime::Bool| {
            let _ = tx.send(granted.as_bool());
        });
        AVCaptureDevice::requestAccessForMediaType_completionHandler(media_type, &handler);
    }

    match rx.recv() {
        Ok(granted) => granted,
        Err(_) => {
            tracing::warn!("microphone permission prompt never completed");
            false
        }
    }
}
