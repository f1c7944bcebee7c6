//! In-memory email store — owns the authoritative set of tracked
//! messages, the last-check watermark, and the lifecycle state machine.
//!
//! Messages are created on ingestion, mutated in place by classification
//! and by the processed-flag transition, and never deleted (retention is
//! process-lifetime only). The store is the single consumer of the
//! classifier gateway and applies its fails-open contract: any classifier
//! error is swallowed here and replaced with the default analysis.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::classifier::{Category, ClassifierGateway, EmailAnalysis};
use crate::mail::RawMessage;

/// A tracked inbox message.
#[derive(Debug, Clone)]
pub struct Email {
    /// Provider-assigned identifier, immutable.
    pub id: String,
    /// Raw sender string, e.g. `Jane Doe <jane@example.com>`.
    pub sender: String,
    pub subject: String,
    pub snippet: String,
    pub received_at: DateTime<Utc>,
    /// False until a reply has been dispatched.
    pub processed: bool,
    pub category: Category,
    /// 0 (lowest) to 3 (highest).
    pub priority: u8,
    pub requires_attention: bool,
    pub intent: String,
    pub suggested_response: String,
    /// Model-drafted reply body, kept alongside the canned templates.
    pub draft_reply: String,
    /// Opaque classifier payload — never inspected by core logic.
    pub analysis_raw: serde_json::Value,
}

/// Authoritative collection of tracked messages.
pub struct EmailStore {
    emails: Vec<Email>,
    last_check: DateTime<Utc>,
    classifier: Arc<dyn ClassifierGateway>,
}

impl EmailStore {
    /// Create an empty store with the watermark set to now.
    pub fn new(classifier: Arc<dyn ClassifierGateway>) -> Self {
        Self::with_watermark(classifier, Utc::now())
    }

    pub fn with_watermark(
        classifier: Arc<dyn ClassifierGateway>,
        watermark: DateTime<Utc>,
    ) -> Self {
        Self {
            emails: Vec::new(),
            last_check: watermark,
            classifier,
        }
    }

    /// Track a new message.
    ///
    /// Rejects records whose timestamp is not strictly after the watermark
    /// and records already tracked under the same identifier. Accepted
    /// messages are classified synchronously before they count as stored;
    /// the message is returned for cycle reporting.
    pub async fn ingest(&mut self, raw: RawMessage) -> Option<Email> {
        let received_at = raw.received_at.unwrap_or_else(Utc::now);

        if received_at <= self.last_check {
            debug!(id = %raw.id, "Skipping message at or before watermark");
            return None;
        }
        if self.emails.iter().any(|e| e.id == raw.id) {
            debug!(id = %raw.id, "Message already tracked");
            return None;
        }

        let analysis = self
            .classifier
            .analyze(&raw.subject, &raw.snippet)
            .await
            .unwrap_or_else(|e| {
                warn!(id = %raw.id, error = %e, "Classifier failed, using default analysis");
                EmailAnalysis::fallback()
            });

        let draft_reply = self
            .classifier
            .generate_reply(analysis.category, analysis.priority, &raw.subject, &raw.snippet)
            .await
            .unwrap_or_else(|e| {
                warn!(id = %raw.id, error = %e, "Reply generation failed, using canned reply");
                analysis.category.reply_template().to_string()
            });

        let email = Email {
            id: raw.id,
            sender: raw.sender,
            subject: raw.subject,
            snippet: raw.snippet,
            received_at,
            processed: false,
            category: analysis.category,
            priority: analysis.priority,
            requires_attention: analysis.requires_attention,
            intent: analysis.intent,
            suggested_response: analysis.suggested_response,
            draft_reply,
            analysis_raw: analysis.raw,
        };

        debug!(
            id = %email.id,
            category = %email.category,
            priority = email.priority,
            "Tracked new message"
        );

        self.emails.push(email.clone());
        Some(email)
    }

    /// Mark a message processed. Unknown identifiers are silently ignored
    /// (accepted policy); calling twice for the same id is a no-op.
    pub fn mark_processed(&mut self, id: &str) {
        match self.emails.iter_mut().find(|e| e.id == id) {
            Some(email) => email.processed = true,
            None => debug!(id, "mark_processed: unknown id ignored"),
        }
    }

    /// All unprocessed messages, in insertion order.
    pub fn unprocessed(&self) -> Vec<&Email> {
        self.emails.iter().filter(|e| !e.processed).collect()
    }

    /// Unprocessed messages, highest priority first. The sort is stable:
    /// equal priorities keep insertion order, which the dispatch loop
    /// relies on for fair ordering.
    pub fn by_priority(&self) -> Vec<&Email> {
        let mut queue = self.unprocessed();
        queue.sort_by_key(|e| std::cmp::Reverse(e.priority));
        queue
    }

    /// Unprocessed messages flagged as requiring attention.
    pub fn requiring_attention(&self) -> Vec<&Email> {
        self.emails
            .iter()
            .filter(|e| !e.processed && e.requires_attention)
            .collect()
    }

    /// Move the watermark to now.
    ///
    /// Exposed for completeness; the dispatch loop deliberately never
    /// calls it, so "new" always means newer than process start and
    /// re-running the ingestion filter each cycle stays idempotent.
    pub fn advance_watermark(&mut self) {
        self.last_check = Utc::now();
    }

    pub fn last_check(&self) -> DateTime<Utc> {
        self.last_check
    }

    /// Every tracked message, in insertion order.
    pub fn all(&self) -> &[Email] {
        &self.emails
    }

    pub fn get(&self, id: &str) -> Option<&Email> {
        self.emails.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use async_trait::async_trait;
    use chrono::Duration;

    /// Classifier returning the same analysis for every message.
    struct FixedClassifier(EmailAnalysis);

    #[async_trait]
    impl ClassifierGateway for FixedClassifier {
        async fn analyze(&self, _: &str, _: &str) -> Result<EmailAnalysis, ClassifierError> {
            Ok(self.0.clone())
        }

        async fn generate_reply(
            &self,
            category: Category,
            _: u8,
            _: &str,
            _: &str,
        ) -> Result<String, ClassifierError> {
            Ok(format!("drafted for {category}"))
        }
    }

    /// Classifier that fails every call.
    struct FailingClassifier;

    #[async_trait]
    impl ClassifierGateway for FailingClassifier {
        async fn analyze(&self, _: &str, _: &str) -> Result<EmailAnalysis, ClassifierError> {
            Err(ClassifierError::RequestFailed("connection refused".into()))
        }

        async fn generate_reply(
            &self,
            _: Category,
            _: u8,
            _: &str,
            _: &str,
        ) -> Result<String, ClassifierError> {
            Err(ClassifierError::RequestFailed("connection refused".into()))
        }
    }

    fn analysis(category: Category, priority: u8, attention: bool) -> EmailAnalysis {
        EmailAnalysis {
            category,
            priority,
            requires_attention: attention,
            intent: "test".into(),
            suggested_response: "ok".into(),
            raw: serde_json::Value::Null,
        }
    }

    fn raw(id: &str, offset_secs: i64) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            sender: format!("Sender {id} <s{id}@example.com>"),
            subject: format!("Subject {id}"),
            snippet: "body".into(),
            received_at: Some(Utc::now() + Duration::seconds(offset_secs)),
        }
    }

    fn store_with(classifier: impl ClassifierGateway + 'static) -> EmailStore {
        EmailStore::with_watermark(Arc::new(classifier), Utc::now() - Duration::hours(1))
    }

    #[tokio::test]
    async fn ingest_rejects_messages_at_or_before_watermark() {
        let watermark = Utc::now();
        let mut store = EmailStore::with_watermark(
            Arc::new(FixedClassifier(analysis(Category::General, 1, false))),
            watermark,
        );

        let mut old = raw("old", 0);
        old.received_at = Some(watermark - Duration::seconds(10));
        assert!(store.ingest(old).await.is_none());

        let mut exact = raw("exact", 0);
        exact.received_at = Some(watermark);
        assert!(store.ingest(exact).await.is_none());

        let mut fresh = raw("fresh", 0);
        fresh.received_at = Some(watermark + Duration::seconds(10));
        assert!(store.ingest(fresh).await.is_some());
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn ingest_stamps_missing_timestamp_with_now() {
        let mut store = store_with(FixedClassifier(analysis(Category::General, 0, false)));
        let mut record = raw("1", 0);
        record.received_at = None;
        let email = store.ingest(record).await.unwrap();
        assert!(email.received_at > store.last_check());
    }

    #[tokio::test]
    async fn ingest_deduplicates_by_id() {
        let mut store = store_with(FixedClassifier(analysis(Category::General, 1, false)));
        assert!(store.ingest(raw("dup", 10)).await.is_some());
        assert!(store.ingest(raw("dup", 20)).await.is_none());
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn ingest_applies_classification() {
        let mut store = store_with(FixedClassifier(analysis(Category::Urgent, 3, true)));
        let email = store.ingest(raw("1", 10)).await.unwrap();
        assert_eq!(email.category, Category::Urgent);
        assert_eq!(email.priority, 3);
        assert!(email.requires_attention);
        assert_eq!(email.draft_reply, "drafted for urgent");
        assert!(!email.processed);
    }

    #[tokio::test]
    async fn classifier_failure_falls_open_to_defaults() {
        let mut store = store_with(FailingClassifier);
        for i in 0..3 {
            store.ingest(raw(&i.to_string(), 10)).await.unwrap();
        }
        for email in store.all() {
            assert_eq!(email.category, Category::General);
            assert_eq!(email.priority, 0);
            assert!(!email.requires_attention);
            assert_eq!(email.intent, "unknown");
            assert_eq!(email.draft_reply, Category::General.reply_template());
        }
    }

    #[tokio::test]
    async fn by_priority_sorts_descending_and_stable() {
        let mut store = store_with(FailingClassifier);
        // Override priorities after ingestion to control ordering exactly
        for (id, priority) in [("a", 1), ("b", 3), ("c", 1), ("d", 2)] {
            store.ingest(raw(id, 10)).await.unwrap();
            store.emails.last_mut().unwrap().priority = priority;
        }

        let ordered: Vec<&str> = store.by_priority().iter().map(|e| e.id.as_str()).collect();
        // Descending by priority; "a" before "c" because ties keep insertion order
        assert_eq!(ordered, vec!["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn mark_processed_is_idempotent_and_tolerant() {
        let mut store = store_with(FixedClassifier(analysis(Category::General, 1, false)));
        store.ingest(raw("1", 10)).await.unwrap();

        store.mark_processed("1");
        store.mark_processed("1");
        store.mark_processed("never-seen");

        assert!(store.get("1").unwrap().processed);
        assert_eq!(store.unprocessed().len(), 0);
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn processed_messages_leave_every_projection() {
        let mut store = store_with(FixedClassifier(analysis(Category::Urgent, 3, true)));
        store.ingest(raw("1", 10)).await.unwrap();
        store.ingest(raw("2", 10)).await.unwrap();

        assert_eq!(store.unprocessed().len(), 2);
        assert_eq!(store.by_priority().len(), 2);
        assert_eq!(store.requiring_attention().len(), 2);

        store.mark_processed("1");
        assert_eq!(store.unprocessed().len(), 1);
        assert_eq!(store.by_priority().len(), 1);
        assert_eq!(store.requiring_attention().len(), 1);
        assert_eq!(store.unprocessed()[0].id, "2");
    }

    #[tokio::test]
    async fn requiring_attention_filters_flag() {
        let mut store = store_with(FixedClassifier(analysis(Category::General, 1, false)));
        store.ingest(raw("calm", 10)).await.unwrap();
        assert!(store.requiring_attention().is_empty());
    }

    #[tokio::test]
    async fn advance_watermark_moves_forward() {
        let mut store = store_with(FailingClassifier);
        let before = store.last_check();
        store.advance_watermark();
        assert!(store.last_check() > before);

        // Messages older than the new watermark are now rejected
        let mut record = raw("late", 0);
        record.received_at = Some(before);
        assert!(store.ingest(record).await.is_none());
    }
}
