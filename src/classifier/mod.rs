//! Classifier gateway — the language-model boundary.
//!
//! Given a subject/snippet pair the gateway produces a structured
//! [`EmailAnalysis`]; a second entry point drafts a free-text reply.
//! The concrete backend is Ollama (see [`ollama`]), but both entry
//! points fail open: any request or parse failure degrades to
//! [`EmailAnalysis::fallback`] or a category-keyed canned reply, so
//! downstream logic always receives a well-formed value.

pub mod ollama;

pub use ollama::OllamaClassifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Default suggested response used whenever the model cannot produce one.
pub const DEFAULT_SUGGESTED_RESPONSE: &str = "Thank you for your email.";

// ── Category ────────────────────────────────────────────────────────

/// Message category assigned by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Urgent,
    Meeting,
    Inquiry,
    FollowUp,
    #[default]
    General,
}

impl Category {
    /// All categories, in summary display order.
    pub const ALL: [Category; 5] = [
        Category::Urgent,
        Category::Meeting,
        Category::Inquiry,
        Category::FollowUp,
        Category::General,
    ];

    /// Parse a category from model output. Unknown text maps to `General`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "urgent" => Category::Urgent,
            "meeting" => Category::Meeting,
            "inquiry" => Category::Inquiry,
            "follow_up" | "follow-up" | "followup" => Category::FollowUp,
            _ => Category::General,
        }
    }

    /// Snake-case label, as used in prompts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Urgent => "urgent",
            Category::Meeting => "meeting",
            Category::Inquiry => "inquiry",
            Category::FollowUp => "follow_up",
            Category::General => "general",
        }
    }

    /// Canned reply for this category — used by the response phase and as
    /// the fallback when the model cannot draft a reply.
    pub fn reply_template(&self) -> &'static str {
        match self {
            Category::Urgent => {
                "I understand this is urgent. I will prioritize your request and respond as soon as possible."
            }
            Category::Meeting => {
                "Thank you for the meeting invitation. I will review the details and respond accordingly."
            }
            Category::Inquiry => {
                "Thank you for your inquiry. I will look into this matter and provide you with a detailed response."
            }
            Category::FollowUp => {
                "Thank you for your follow-up. I will address this matter promptly."
            }
            Category::General => "Thank you for your email. I will get back to you soon.",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Analysis ────────────────────────────────────────────────────────

/// Structured analysis of one message.
#[derive(Debug, Clone)]
pub struct EmailAnalysis {
    pub category: Category,
    /// 0 (lowest) to 3 (highest).
    pub priority: u8,
    pub requires_attention: bool,
    /// Brief free-text description of the message's purpose.
    pub intent: String,
    /// Short response template suggested by the model.
    pub suggested_response: String,
    /// Opaque model payload, kept for display only — never inspected by
    /// core logic.
    pub raw: serde_json::Value,
}

impl EmailAnalysis {
    /// Fixed default analysis substituted on any classifier failure.
    pub fn fallback() -> Self {
        Self {
            category: Category::General,
            priority: 0,
            requires_attention: false,
            intent: "unknown".to_string(),
            suggested_response: DEFAULT_SUGGESTED_RESPONSE.to_string(),
            raw: serde_json::Value::Null,
        }
    }
}

// ── Gateway trait ───────────────────────────────────────────────────

/// Language-model boundary — pure I/O, no lifecycle logic.
///
/// Implementations may return errors freely; the store applies the
/// fails-open contract when it consumes the gateway.
#[async_trait]
pub trait ClassifierGateway: Send + Sync {
    /// Analyze a message, returning category, priority and intent metadata.
    async fn analyze(&self, subject: &str, snippet: &str)
    -> Result<EmailAnalysis, ClassifierError>;

    /// Draft a free-text reply body for an already-analyzed message.
    async fn generate_reply(
        &self,
        category: Category,
        priority: u8,
        subject: &str,
        snippet: &str,
    ) -> Result<String, ClassifierError>;
}

// ── Output parsing ──────────────────────────────────────────────────

/// Wire shape of the model's JSON analysis. Every field is optional —
/// missing fields take the fallback values.
#[derive(Debug, Deserialize)]
struct WireAnalysis {
    #[serde(default)]
    category: String,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    requires_attention: bool,
    #[serde(default)]
    intent: String,
    #[serde(default)]
    suggested_response: String,
}

/// Parse raw model output into an analysis.
///
/// Tolerates a bare JSON object, a markdown-fenced JSON object, and loose
/// `field: value` lines. Anything else yields [`EmailAnalysis::fallback`].
pub fn parse_analysis(raw: &str) -> EmailAnalysis {
    if let Some(json_str) = extract_json_object(raw) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&json_str) else {
            return EmailAnalysis::fallback();
        };
        let Ok(wire) = serde_json::from_value::<WireAnalysis>(value.clone()) else {
            return EmailAnalysis::fallback();
        };

        let intent = if wire.intent.is_empty() {
            "unknown".to_string()
        } else {
            wire.intent
        };
        let suggested_response = if wire.suggested_response.is_empty() {
            DEFAULT_SUGGESTED_RESPONSE.to_string()
        } else {
            wire.suggested_response
        };

        return EmailAnalysis {
            category: Category::parse(&wire.category),
            priority: wire.priority.clamp(0, 3) as u8,
            requires_attention: wire.requires_attention,
            intent,
            suggested_response,
            raw: value,
        };
    }

    parse_loose_lines(raw)
}

/// Extract a JSON object from model output (handles markdown wrapping).
/// Returns `None` when the text contains no object at all.
fn extract_json_object(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return Some(trimmed.to_string());
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim().to_string());
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return Some(trimmed[start..=end].to_string());
    }

    None
}

/// Fallback parse for loosely formatted `field: value` output.
fn parse_loose_lines(raw: &str) -> EmailAnalysis {
    let mut analysis = EmailAnalysis::fallback();

    for line in raw.lines() {
        let lower = line.to_lowercase();
        let value = || line.splitn(2, ':').nth(1).unwrap_or("").trim().to_string();

        if lower.contains("category:") {
            analysis.category = Category::parse(&value());
        } else if lower.contains("priority:") {
            if let Ok(p) = value().parse::<i64>() {
                analysis.priority = p.clamp(0, 3) as u8;
            }
        } else if lower.contains("requires_attention:") {
            analysis.requires_attention = lower.contains("true");
        } else if lower.contains("intent:") {
            analysis.intent = value();
        } else if lower.contains("suggested_response:") {
            analysis.suggested_response = value();
        }
    }

    analysis
}
