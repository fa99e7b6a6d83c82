const COMMANDS: &[&str] = &[
    "check_permissions",
    "request_permissions",
    "enable_microphone",
    "disable_microphone",
    "start_recording",
    "stop_recording",
];

fn main() {
    tauri_plugin::Builder::new(COMMANDS).build();
}
