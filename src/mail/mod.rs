//! Mail gateway — the provider boundary.
//!
//! Two operations: list unread messages, send a message. No lifecycle
//! logic lives here; transport errors propagate unmodified.

pub mod imap_smtp;

pub use imap_smtp::ImapSmtpGateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MailError;

/// Raw unread message record as returned by the provider.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Provider-assigned unique identifier.
    pub id: String,
    /// Raw sender string, e.g. `Jane Doe <jane@example.com>`.
    pub sender: String,
    pub subject: String,
    /// Short body preview.
    pub snippet: String,
    /// Stamped by the dispatch loop when the provider omits it.
    pub received_at: Option<DateTime<Utc>>,
}

/// Provider receipt for a sent message.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub to: String,
    /// Provider-defined acknowledgement (SMTP reply code for this impl).
    pub response: String,
}

/// Mail provider boundary — pure I/O.
#[async_trait]
pub trait MailGateway: Send + Sync {
    /// List unread messages, newest batch first, up to `max_results`.
    async fn list_unread(&self, max_results: usize) -> Result<Vec<RawMessage>, MailError>;

    /// Send a message. Errors propagate unmodified; there is no retry.
    async fn send(&self, to: &str, subject: &str, body: &str)
    -> Result<DeliveryReceipt, MailError>;
}

/// Extract the reply address from a raw `Name <addr>` sender string.
///
/// Best-effort: when no bracketed address is present the raw string is
/// returned unchanged. Never fails.
pub fn reply_address(sender: &str) -> &str {
    match (sender.rfind('<'), sender.rfind('>')) {
        (Some(start), Some(end)) if end > start => sender[start + 1..end].trim(),
        _ => sender.trim(),
    }
}
