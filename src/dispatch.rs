//! Dispatch loop — per-cycle orchestration of ingest-then-respond.
//!
//! Each cycle runs two phases to completion, sequentially:
//! 1. **Ingestion**: fetch unread records from the mail gateway, stamp a
//!    received timestamp when absent, hand each to the store.
//! 2. **Response**: walk the unprocessed backlog in priority order, send a
//!    category-templated reply, mark each message processed.
//!
//! Mail transport errors end the current cycle (the caller logs and waits
//! for the next tick); the backlog is retained and retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::classifier::Category;
use crate::error::Result;
use crate::mail::{MailGateway, reply_address};
use crate::store::{Email, EmailStore};

/// Outcome of replying to one message.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub id: String,
    pub priority: u8,
    pub category: Category,
    pub requires_attention: bool,
}

/// What one polling cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Messages accepted by the store this cycle.
    pub new_messages: Vec<Email>,
    /// Replies dispatched this cycle (includes backlog from prior cycles).
    pub responded: Vec<DispatchResult>,
}

/// Per-cycle orchestrator. Owns the store (single writer) and reaches the
/// outside world only through the mail gateway.
pub struct DispatchLoop {
    mail: Arc<dyn MailGateway>,
    store: EmailStore,
    max_results: usize,
    started_at: DateTime<Utc>,
}

impl DispatchLoop {
    pub fn new(mail: Arc<dyn MailGateway>, store: EmailStore, max_results: usize) -> Self {
        Self {
            mail,
            store,
            max_results,
            started_at: Utc::now(),
        }
    }

    pub fn store(&self) -> &EmailStore {
        &self.store
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Run one full cycle: ingest, then respond in priority order.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let new_messages = self.ingest_phase().await?;
        let responded = self.respond_phase().await?;
        Ok(CycleReport {
            new_messages,
            responded,
        })
    }

    /// Fetch unread records and track the fresh ones.
    async fn ingest_phase(&mut self) -> Result<Vec<Email>> {
        let records = self.mail.list_unread(self.max_results).await?;
        debug!(fetched = records.len(), "Ingestion phase");

        let mut accepted = Vec::new();
        for mut record in records {
            if record.received_at.is_none() {
                record.received_at = Some(Utc::now());
            }
            if let Some(email) = self.store.ingest(record).await {
                accepted.push(email);
            }
        }

        if !accepted.is_empty() {
            info!(new = accepted.len(), "Tracked new messages");
        }
        Ok(accepted)
    }

    /// Reply to every unprocessed message, highest priority first.
    ///
    /// Runs even when ingestion found nothing new, so backlog left by a
    /// previously failed send still drains.
    async fn respond_phase(&mut self) -> Result<Vec<DispatchResult>> {
        let queue: Vec<Email> = self.store.by_priority().into_iter().cloned().collect();
        let mut results = Vec::with_capacity(queue.len());

        for email in queue {
            let to = reply_address(&email.sender).to_string();
            let subject = format!("Re: {}", email.subject);
            let body = reply_body(email.category);

            self.mail.send(&to, &subject, &body).await?;
            self.store.mark_processed(&email.id);

            info!(
                id = %email.id,
                to = %to,
                category = %email.category,
                priority = email.priority,
                "Reply dispatched"
            );

            results.push(DispatchResult {
                id: email.id,
                priority: email.priority,
                category: email.category,
                requires_attention: email.requires_attention,
            });
        }

        Ok(results)
    }
}

/// Category reply template, with the urgency prefixes applied.
fn reply_body(category: Category) -> String {
    let template = category.reply_template();
    match category {
        Category::Urgent => format!("URGENT: {template}"),
        Category::Meeting => format!("RE: Meeting: {template}"),
        _ => template.to_string(),
    }
}
