use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::{AnalysisResult, Correction};
use crate::permissions::PermissionState;
use crate::store::ReportEntry;
use crate::utils::preview;

pub const NOTIFICATION_TITLE: &str = "✍️ Writing Suggestions";
pub const NOTIFICATION_KIND: &str = "grammar_check";
const APP_NAME: &str = "proofread";
const SUMMARY_CORRECTIONS: usize = 2;
const DISPLAY_TIMEOUT_MS: u32 = 8_000;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub report_id: String,
    pub original_text: String,
    pub corrected_text: String,
    pub corrections: Vec<Correction>,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: NotificationPayload,
}

impl Notification {
    /// Builds the user-facing suggestion for a stored report, or `None` when
    /// the analysis found nothing to correct.
    pub fn for_report(entry: &ReportEntry) -> Option<Self> {
        let analysis = &entry.analysis;
        if !analysis.has_errors || analysis.corrections.is_empty() {
            return None;
        }

        Some(Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: summary_body(&analysis.corrections),
            data: NotificationPayload {
                kind: NOTIFICATION_KIND.to_string(),
                report_id: entry.id.clone(),
                original_text: entry.original_text.clone(),
                corrected_text: analysis.corrected_text.clone(),
                corrections: analysis.corrections.clone(),
                analysis: analysis.clone(),
            },
        })
    }
}

fn summary_body(corrections: &[Correction]) -> String {
    let count = corrections.len();
    let noun = if count > 1 { "issues" } else { "issue" };
    let summary = corrections
        .iter()
        .take(SUMMARY_CORRECTIONS)
        .map(|correction| format!("{} → {}", correction.original, correction.corrected))
        .collect::<Vec<_>>()
        .join(", ");
    let ellipsis = if count > SUMMARY_CORRECTIONS { "..." } else { "" };

    format!("Found {count} {noun}: {summary}{ellipsis}")
}

/// Delivers suggestions to the user. Calls may block, so the monitor runs
/// them on the blocking pool.
pub trait Notifier: Send + Sync {
    fn permission(&self) -> PermissionState;

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Desktop notifications through the platform notification service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn permission(&self) -> PermissionState {
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            match notify_rust::get_server_information() {
                Ok(info) => {
                    debug!(server = %info.name, version = %info.version, "notification server found");
                    PermissionState::Granted
                }
                Err(err) => {
                    debug!("no notification server: {err}");
                    PermissionState::Denied
                }
            }
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            PermissionState::Granted
        }
    }

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(&notification.title)
            .body(&notification.body)
            .timeout(notify_rust::Timeout::Milliseconds(DISPLAY_TIMEOUT_MS))
            .show()
            .map(|_| ())
            .map_err(|err| NotifyError::Delivery(err.to_string()))
    }
}

/// Writes suggestions to the log instead of the desktop.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            report_id = %notification.data.report_id,
            text = %preview(&notification.data.original_text),
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisOutcome, CorrectionKind};
    use crate::source::SourceKind;

    fn correction(original: &str, corrected: &str) -> Correction {
        Correction {
            kind: CorrectionKind::Grammar,
            original: original.to_string(),
            corrected: corrected.to_string(),
            explanation: None,
        }
    }

    fn entry_with(corrections: Vec<Correction>) -> ReportEntry {
        let text = "She go to school every days.";
        let result = AnalysisResult {
            has_errors: !corrections.is_empty(),
            error_count: corrections.len(),
            corrections,
            corrected_text: "She goes to school every day.".to_string(),
        };
        ReportEntry::new(text, AnalysisOutcome::Parsed(result), SourceKind::Clipboard)
    }

    #[test]
    fn single_correction_uses_singular_wording() {
        let entry = entry_with(vec![correction("go", "goes")]);
        let notification = Notification::for_report(&entry).expect("has corrections");

        assert_eq!(notification.title, NOTIFICATION_TITLE);
        assert_eq!(notification.body, "Found 1 issue: go → goes");
    }

    #[test]
    fn summary_lists_two_corrections_then_ellipsis() {
        let entry = entry_with(vec![
            correction("go", "goes"),
            correction("days", "day"),
            correction("school", "School"),
        ]);
        let notification = Notification::for_report(&entry).expect("has corrections");

        assert_eq!(
            notification.body,
            "Found 3 issues: go → goes, days → day..."
        );
    }

    #[test]
    fn payload_carries_the_full_analysis() {
        let entry = entry_with(vec![correction("go", "goes")]);
        let notification = Notification::for_report(&entry).expect("has corrections");

        let json = serde_json::to_value(&notification).expect("serialize");
        assert_eq!(json["data"]["type"], "grammar_check");
        assert_eq!(json["data"]["reportId"], entry.id.as_str());
        assert_eq!(json["data"]["originalText"], "She go to school every days.");
        assert_eq!(json["data"]["correctedText"], "She goes to school every day.");
        assert_eq!(json["data"]["corrections"][0]["type"], "grammar");
        assert_eq!(json["data"]["analysis"]["errorCount"], 1);
    }

    #[test]
    fn clean_results_produce_no_notification() {
        let entry = entry_with(Vec::new());
        assert!(Notification::for_report(&entry).is_none());
    }
}
