//! Claude Code hook payload translation.

use std::path::PathBuf;

use chime_core::EventKind;
use serde::Deserialize;

/// The fields chime reads from a hook's stdin JSON. Everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HookPayload {
    #[serde(default)]
    pub hook_event_name: String,
    #[serde(default)]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl HookPayload {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

/// Event kind for a hook payload, or `None` for hooks chime ignores.
pub fn translate(payload: &HookPayload) -> Option<EventKind> {
    match payload.hook_event_name.as_str() {
        "Stop" => Some(EventKind::Stop),
        "SubagentStop" => Some(EventKind::Subagent),
        "Notification" => classify_notification(payload),
        _ => None,
    }
}

/// Known `notification_type` first, then the message text. Notifications
/// that are neither a permission request nor an idle prompt are ignored.
fn classify_notification(payload: &HookPayload) -> Option<EventKind> {
    match payload.notification_type.as_deref() {
        Some("permission_prompt") => return Some(EventKind::PermissionPrompt),
        Some("idle_prompt") => return Some(EventKind::IdlePrompt),
        _ => {}
    }
    let message = payload.message.as_deref().unwrap_or_default().to_ascii_lowercase();
    if message.contains("waiting for your input") {
        Some(EventKind::IdlePrompt)
    } else if message.contains("permission") {
        Some(EventKind::PermissionPrompt)
    } else {
        None
    }
}
