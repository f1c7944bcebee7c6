//! Operator-facing projections over the email store.
//!
//! Read-only: a per-cycle status block and a category-grouped summary of
//! the unprocessed backlog, both rendered as plain text.

use chrono::{DateTime, Utc};

use crate::classifier::Category;
use crate::store::{Email, EmailStore};

/// Counts and timestamps for the status block.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub total: usize,
    pub unprocessed: usize,
    pub processed: usize,
    pub attention_required: usize,
    pub start_time: DateTime<Utc>,
    pub last_check: DateTime<Utc>,
}

impl StatusReport {
    pub fn collect(store: &EmailStore, start_time: DateTime<Utc>) -> Self {
        let total = store.all().len();
        let unprocessed = store.unprocessed().len();
        Self {
            total,
            unprocessed,
            processed: total - unprocessed,
            attention_required: store.requiring_attention().len(),
            start_time,
            last_check: store.last_check(),
        }
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Email Processing Status:")?;
        writeln!(f, "  Total Emails: {}", self.total)?;
        writeln!(f, "  Unprocessed: {}", self.unprocessed)?;
        writeln!(f, "  Processed: {}", self.processed)?;
        writeln!(f, "  Requiring Attention: {}", self.attention_required)?;
        writeln!(f, "  Start Time: {}", self.start_time.to_rfc3339())?;
        write!(f, "  Last Check: {}", self.last_check.to_rfc3339())
    }
}

/// Render the unprocessed backlog grouped by category, highest priority
/// first within each group. Empty backlog renders a one-liner.
pub fn category_summary(store: &EmailStore) -> String {
    let unprocessed = store.unprocessed();
    if unprocessed.is_empty() {
        return "No unprocessed emails.".to_string();
    }

    let mut out = String::from("Email Summary:");
    for category in Category::ALL {
        let mut group: Vec<&&Email> = unprocessed
            .iter()
            .filter(|e| e.category == category)
            .collect();
        if group.is_empty() {
            continue;
        }
        group.sort_by_key(|e| std::cmp::Reverse(e.priority));

        out.push_str(&format!("\n\n{} Emails:", category.label().to_uppercase()));
        for email in group {
            out.push('\n');
            out.push_str(&display_email(email));
        }
    }
    out
}

/// One message, formatted for the summary.
fn display_email(email: &Email) -> String {
    let stars = "*".repeat(email.priority as usize);
    let attention = if email.requires_attention {
        " [attention]"
    } else {
        ""
    };
    let status = if email.processed {
        "Processed"
    } else {
        "Unprocessed"
    };

    format!(
        "  From: {}\n  Subject: {}\n  Category: {} {}{}\n  Intent: {}\n  Snippet: {}\n  Received: {}\n  Status: {}\n  Suggested: {}",
        email.sender,
        email.subject,
        email.category.label().to_uppercase(),
        stars,
        attention,
        email.intent,
        email.snippet,
        email.received_at.to_rfc3339(),
        status,
        email.suggested_response,
    )
}
