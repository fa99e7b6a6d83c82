//! Microphone plugin
//!
//! Exposes two independent audio capture paths to the webview: a raw
//! streaming path that forwards 16-bit PCM buffers as events while appending
//! them to a per-session file, and a clip recording path that produces an
//! AAC file returned as base64 plus metadata. Both sit behind a microphone
//! permission gate.

pub mod capture;
pub mod commands;
pub mod error;
pub mod recorder;

pub use error::{Error, Result};

use serde::Deserialize;
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{Manager, Runtime};

/// Plugin configuration, read from `plugins.microphone` in the Tauri config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Permission aliases the application declares up front. Only declared
    /// aliases may trigger an OS prompt.
    #[serde(default = "default_declared_permissions")]
    pub declared_permissions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            declared_permissions: default_declared_permissions(),
        }
    }
}

fn default_declared_permissions() -> Vec<String> {
    vec![capture::MICROPHONE_ALIAS.to_string()]
}

/// Initialize the microphone plugin.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<Config>> {
    Builder::<R, Option<Config>>::new("microphone")
        .invoke_handler(tauri::generate_handler![
            commands::check_permissions,
            commands::request_permissions,
            commands::enable_microphone,
            commands::disable_microphone,
            commands::start_recording,
            commands::stop_recording,
        ])
        .setup(|app, api| {
            let config = api.config().clone().unwrap_or_default();
            let cache_dir = app
                .path()
                .app_cache_dir()
                .unwrap_or_else(|_| std::env::temp_dir());
            tracing::info!(
                "microphone plugin initialized, capture files under {:?}",
                cache_dir
            );
            app.manage(commands::MicrophoneState::new(&config, cache_dir));
            Ok(())
        })
        .build()
}
