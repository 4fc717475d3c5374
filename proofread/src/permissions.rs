use serde::Serialize;

use crate::notify::Notifier;
use crate::source::SystemClipboard;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionReport {
    pub notifications: PermissionState,
    pub clipboard: PermissionState,
    pub guidance: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Unknown,
}

pub fn check_permissions(notifier: &dyn Notifier) -> PermissionReport {
    build_report(notifier.permission(), check_clipboard_access())
}

fn build_report(notifications: PermissionState, clipboard: PermissionState) -> PermissionReport {
    let mut guidance = Vec::new();
    if notifications == PermissionState::Denied {
        guidance.push(
            "Desktop notifications are unavailable. Start a notification daemon or allow notifications for this terminal."
                .to_string(),
        );
    }
    if notifications == PermissionState::Unknown {
        guidance.push(
            "Notification support could not be confirmed; suggestions may only appear in the log."
                .to_string(),
        );
    }
    if clipboard == PermissionState::Denied {
        guidance.push(
            "Clipboard cannot be opened. Run inside a graphical session or grant clipboard access."
                .to_string(),
        );
    }
    if guidance.is_empty() {
        guidance.push("Permissions look healthy.".to_string());
    }

    PermissionReport {
        notifications,
        clipboard,
        guidance,
    }
}

fn check_clipboard_access() -> PermissionState {
    match SystemClipboard::probe() {
        Ok(()) => PermissionState::Granted,
        Err(err) => {
            let message = err.to_string().to_lowercase();
            if message.contains("not supported") || message.contains("unsupported") {
                PermissionState::Unknown
            } else {
                PermissionState::Denied
            }
        }
    }
}
