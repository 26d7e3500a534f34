//! Review item model.

use serde::{Deserialize, Serialize};

/// A pull request on which the user's review has been requested.
///
/// Items are immutable once built from a snapshot. When a later poll returns
/// the same `id` with different data the whole item is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// GitHub issue/PR ID (global, stable across polls).
    pub id: i64,

    /// PR title.
    pub title: String,

    /// Browser URL of the PR.
    pub url: String,

    /// Author's GitHub login.
    pub author: String,

    /// Repository-scoped PR number.
    pub number: i64,

    /// Lines added, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<i64>,

    /// Lines removed, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletions: Option<i64>,

    /// Number of changed files, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<i64>,

    /// How many separate times review was requested from the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_request_count: Option<i64>,
}

impl ReviewItem {
    /// Build an item with no size metrics.
    pub fn new(
        id: i64,
        title: impl Into<String>,
        url: impl Into<String>,
        author: impl Into<String>,
        number: i64,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            url: url.into(),
            author: author.into(),
            number,
            additions: None,
            deletions: None,
            changed_files: None,
            review_request_count: None,
        }
    }

    /// `+1,234/-56` when both line counts are known.
    pub fn change_summary(&self) -> Option<String> {
        match (self.additions, self.deletions) {
            (Some(add), Some(del)) => Some(format!(
                "+{}/-{}",
                group_thousands(add),
                group_thousands(del)
            )),
            _ => None,
        }
    }

    /// One line for a listing, marked by snooze state.
    pub fn display_line(&self, snoozed: bool) -> String {
        let marker = if snoozed { "💤" } else { "🔍" };
        match self.change_summary() {
            Some(changes) => format!("{} {} ({})", marker, self.title, changes),
            None => format!("{} {}", marker, self.title),
        }
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ReviewItem {
        ReviewItem::new(
            42,
            "Add retry to uploader",
            "https://github.com/acme/api/pull/7",
            "octocat",
            7,
        )
    }

    #[test]
    fn test_display_line_without_metrics() {
        assert_eq!(item().display_line(false), "🔍 Add retry to uploader");
        assert_eq!(item().display_line(true), "💤 Add retry to uploader");
    }

    #[test]
    fn test_display_line_with_metrics() {
        let mut pr = item();
        pr.additions = Some(1234);
        pr.deletions = Some(56);
        assert_eq!(
            pr.display_line(false),
            "🔍 Add retry to uploader (+1,234/-56)"
        );
    }

    #[test]
    fn test_change_summary_needs_both_counts() {
        let mut pr = item();
        pr.additions = Some(10);
        assert!(pr.change_summary().is_none());
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-4500), "-4,500");
    }

    #[test]
    fn test_missing_metrics_not_serialized() {
        let json = serde_json::to_string(&item()).unwrap();
        assert!(!json.contains("additions"));
        assert!(json.contains("\"number\":7"));
    }
}
