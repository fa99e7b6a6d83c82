//! Microphone permission gate
//!
//! Wraps the platform authorization API behind a trait and enforces the
//! declaration rule: a permission prompt is only shown for aliases the
//! application declared up front. Checking never prompts.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alias the host application declares and callers pass to request().
pub const MICROPHONE_ALIAS: &str = "microphone";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub microphone: PermissionState,
}

/// Platform authorization seam.
///
/// `check` is read-only; `request` may present the OS prompt and blocks
/// until the user answers.
pub trait MicrophoneAuthorizer: Send + Sync {
    fn check(&self) -> PermissionState;
    fn request(&self) -> PermissionState;
}

/// Production authorizer dispatching to the platform capture API.
pub struct PlatformAuthorizer;

impl MicrophoneAuthorizer for PlatformAuthorizer {
    fn check(&self) -> PermissionState {
        if has_microphone_permission() {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }

    fn request(&self) -> PermissionState {
        if request_microphone_permission() {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }
}

#[cfg(target_os = "macos")]
fn has_microphone_permission() -> bool {
    crate::capture::macos::permissions::has_microphone_permission()
}

#[cfg(target_os = "macos")]
fn request_microphone_permission() -> bool {
    crate::capture::macos::permissions::request_microphone_permission()
}

// Other desktop platforms gate microphone access at device-open time, not
// through an upfront authorization API.
#[cfg(not(target_os = "macos"))]
fn has_microphone_permission() -> bool {
    true
}

#[cfg(not(target_os = "macos"))]
fn request_microphone_permission() -> bool {
    true
}

/// Permission gate sitting in front of both capture paths.
pub struct PermissionGate {
    authorizer: Arc<dyn MicrophoneAuthorizer>,
    declared: bool,
}

impl PermissionGate {
    pub fn new(authorizer: Arc<dyn MicrophoneAuthorizer>, declared_aliases: &[String]) -> Self {
        Self {
            authorizer,
            declared: declared_aliases.iter().any(|a| a == MICROPHONE_ALIAS),
        }
    }

    pub fn is_granted(&self) -> bool {
        self.authorizer.check() == PermissionState::Granted
    }

    /// Read the current state without prompting.
    pub fn check(&self) -> PermissionStatus {
        PermissionStatus {
            microphone: self.authorizer.check(),
        }
    }

    /// Prompt for the microphone alias if it was both requested and
    /// declared; otherwise fall back to a plain check. Skipping the prompt
    /// rather than erroring matches how undeclared permissions behave on
    /// platforms that enforce declarations at the OS level.
    pub fn request(&self, requested: Option<&[String]>) -> PermissionStatus {
        let wants_microphone = requested
            .map(|aliases| aliases.iter().any(|a| a == MICROPHONE_ALIAS))
            .unwrap_or(true);

        let microphone = if wants_microphone && self.declared {
            self.authorizer.request()
        } else {
            if wants_microphone && !self.declared {
                tracing::warn!("microphone permission requested but not declared; not prompting");
            }
            self.authorizer.check()
        };

        PermissionStatus { microphone }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAuthorizer {
        state: PermissionState,
        prompts: AtomicUsize,
    }

    impl FakeAuthorizer {
        fn denied() -> Arc<Self> {
            Arc::new(Self {
                state: PermissionState::Denied,
                prompts: AtomicUsize::new(0),
            })
        }
    }

    impl MicrophoneAuthorizer for FakeAuthorizer {
        fn check(&self) -> PermissionState {
            self.state
        }

        fn request(&self) -> PermissionState {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            PermissionState::Granted
        }
    }

    fn declared() -> Vec<String> {
        vec![MICROPHONE_ALIAS.to_string()]
    }

    #[test]
    fn check_never_prompts() {
        let auth = FakeAuthorizer::denied();
        let gate = PermissionGate::new(auth.clone(), &declared());

        assert_eq!(gate.check().microphone, PermissionState::Denied);
        assert!(!gate.is_granted());
        assert_eq!(auth.prompts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn declared_request_prompts() {
        let auth = FakeAuthorizer::denied();
        let gate = PermissionGate::new(auth.clone(), &declared());

        let status = gate.request(Some(&declared()));
        assert_eq!(status.microphone, PermissionState::Granted);
        assert_eq!(auth.prompts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn request_without_alias_list_prompts_for_declared_microphone() {
        let auth = FakeAuthorizer::denied();
        let gate = PermissionGate::new(auth.clone(), &declared());

        let status = gate.request(None);
        assert_eq!(status.microphone, PermissionState::Granted);
        assert_eq!(auth.prompts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn undeclared_request_falls_back_to_check() {
        let auth = FakeAuthorizer::denied();
        let gate = PermissionGate::new(auth.clone(), &[]);

        let status = gate.request(Some(&declared()));
        assert_eq!(status.microphone, PermissionState::Denied);
        assert_eq!(auth.prompts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn request_for_other_aliases_does_not_prompt() {
        let auth = FakeAuthorizer::denied();
        let gate = PermissionGate::new(auth.clone(), &declared());

        let status = gate.request(Some(&[String::from("camera")]));
        assert_eq!(status.microphone, PermissionState::Denied);
        assert_eq!(auth.prompts.load(Ordering::SeqCst), 0);
    }
}
