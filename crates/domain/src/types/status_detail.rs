//! Structured status-detail block written back onto billing records.
//!
//! End users read the record's status-detail field to understand why a bill
//! did not land in the ledger; the rendered block is the single source of
//! truth for sync outcomes. The layout matches the banner format the record
//! store already uses for other processes.

use chrono::{DateTime, Utc};

/// Human-readable diagnostic written to the record's status-detail field.
#[derive(Debug, Clone)]
pub struct StatusDetail {
    pub logged_at: DateTime<Utc>,
    /// Link to the bill document the issue refers to.
    pub file_link: String,
    /// One-line issue headline.
    pub status: String,
    /// Explanation of what the issue means.
    pub detail: String,
    /// Numbered next steps for the operator.
    pub actions: Vec<String>,
    pub process: String,
}

impl StatusDetail {
    /// Create a detail block for the sync process with default next steps.
    #[must_use]
    pub fn new(file_link: impl Into<String>, status: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            logged_at: Utc::now(),
            file_link: file_link.into(),
            status: status.into(),
            detail: detail.into(),
            actions: vec![
                "Fix the issue described above and set the bill back to \"Send bill to QB\"."
                    .to_string(),
                "If the error persists, call your system admin.".to_string(),
            ],
            process: "Record store to QuickBooks".to_string(),
        }
    }

    /// Replace the default next steps.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.actions = actions;
        self
    }
}

impl std::fmt::Display for StatusDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stamp = self.logged_at.format("%Y-%m-%d %H:%M:%S");
        let actions = self
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| format!("{}. {}", i + 1, action))
            .collect::<Vec<_>>()
            .join("\n\t");

        write!(
            f,
            " ----------- START: Logged at {stamp} -----------\n\n\
             ** Process: {} **\n\n\
             ** File: {} **\n\n\
             ** Issue: {} **\n\n\
             ** What this means: **\n\n\
             ** {} **\n\n\
             ** Next steps for you: **\n\n\
             \t{actions}\n\n\
             ----------- END: Logged at {stamp} -----------",
            self.process, self.file_link, self.status, self.detail,
        )
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for status detail rendering.
    use super::*;

    /// Validates `StatusDetail` rendering layout.
    ///
    /// Assertions:
    /// - Confirms the banner, process, issue, and numbered actions appear.
    #[test]
    fn renders_banner_block() {
        let detail = StatusDetail::new(
            "https://files.example.com/bill.pdf",
            "404: Vendor 'H-42' not found in QuickBooks",
            "The hauler on this bill has no matching vendor in QuickBooks.",
        );

        let rendered = detail.to_string();
        assert!(rendered.contains("----------- START: Logged at "));
        assert!(rendered.contains("** Process: Record store to QuickBooks **"));
        assert!(rendered.contains("** Issue: 404: Vendor 'H-42' not found in QuickBooks **"));
        assert!(rendered.contains("1. Fix the issue"));
        assert!(rendered.contains("2. If the error persists"));
        assert!(rendered.contains("----------- END: Logged at "));
    }

    /// Validates `StatusDetail::with_actions` behavior.
    ///
    /// Assertions:
    /// - Confirms custom actions replace the defaults.
    #[test]
    fn custom_actions_replace_defaults() {
        let detail = StatusDetail::new("link", "issue", "meaning")
            .with_actions(vec!["Reconnect QuickBooks.".to_string()]);

        let rendered = detail.to_string();
        assert!(rendered.contains("1. Reconnect QuickBooks."));
        assert!(!rendered.contains("system admin"));
    }
}
