//! Notifier implementations.

use crate::models::ReviewItem;
use crate::services::snapshot_source::Notifier;
use crate::services::tracker_events::ArrivalNotification;
use std::io::Write;

/// Writes arrivals to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, items: &[ReviewItem]) {
        for note in ArrivalNotification::for_arrivals(items) {
            log::info!("[notify] {}: {}", note.title, note.body);
        }
    }
}

/// Prints arrivals to the terminal, optionally ringing the bell.
#[derive(Debug, Clone, Copy)]
pub struct TerminalNotifier {
    pub bell: bool,
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self { bell: true }
    }
}

impl TerminalNotifier {
    fn render(&self, notes: &[ArrivalNotification]) -> String {
        let mut out = String::new();
        if self.bell && !notes.is_empty() {
            out.push('\x07');
        }
        for note in notes {
            out.push_str(&format!("🔔 {}\n   {}\n", note.title, note.body));
            if let Some(url) = &note.url {
                out.push_str(&format!("   {}\n", url));
            }
        }
        out
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, items: &[ReviewItem]) {
        let notes = ArrivalNotification::for_arrivals(items);
        let rendered = self.render(&notes);

        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(rendered.as_bytes()).and_then(|_| stdout.flush()) {
            log::warn!("[notify] Failed to write notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single() {
        let item = ReviewItem::new(1, "Tidy imports", "https://github.com/a/b/pull/2", "mona", 2);
        let notes = ArrivalNotification::for_arrivals(&[item]);
        let out = TerminalNotifier { bell: false }.render(&notes);

        assert!(out.contains("Review requested: #2"));
        assert!(out.contains("Tidy imports by @mona"));
        assert!(out.contains("https://github.com/a/b/pull/2"));
        assert!(!out.contains('\x07'));
    }

    #[test]
    fn test_log_notifier_accepts_batches() {
        let items: Vec<ReviewItem> = (1..=5)
            .map(|n| ReviewItem::new(n, format!("PR {}", n), "https://github.com/a/b/pull/1", "mona", n))
            .collect();
        LogNotifier.notify(&items);
        LogNotifier.notify(&[]);
    }

    #[test]
    fn test_bell_only_with_notes() {
        let notifier = TerminalNotifier::default();
        assert_eq!(notifier.render(&[]), "");
    }
}
