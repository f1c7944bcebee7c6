//! Ollama-backed classifier — plain HTTP calls to a local model.
//!
//! Uses the non-streaming `/api/generate` endpoint. Prompt construction
//! and output parsing live here; the fails-open fallback is applied by
//! the store, not by this client.

use serde::{Deserialize, Serialize};

use crate::classifier::{Category, ClassifierGateway, EmailAnalysis, parse_analysis};
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;

const SYSTEM_PROMPT: &str = "You are an intelligent email assistant. Your tasks are:\n\
1. Analyze email content for intent and urgency\n\
2. Categorize emails into: urgent, meeting, inquiry, follow_up, or general\n\
3. Determine if the email requires immediate attention\n\
4. Generate appropriate responses\n\
5. Assign priority levels (0-3) based on content analysis\n\n\
Be concise and accurate in your analysis.";

/// Classifier backed by a local Ollama instance.
pub struct OllamaClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// One completion round-trip. Returns the raw model text.
    async fn generate(&self, prompt: &str) -> Result<String, ClassifierError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system: SYSTEM_PROMPT,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifierError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifierError::InvalidResponse(format!(
                "HTTP {} from model backend",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        Ok(body.response)
    }
}

#[async_trait::async_trait]
impl ClassifierGateway for OllamaClassifier {
    async fn analyze(
        &self,
        subject: &str,
        snippet: &str,
    ) -> Result<EmailAnalysis, ClassifierError> {
        let prompt = build_analysis_prompt(subject, snippet);
        let text = self.generate(&prompt).await?;
        Ok(parse_analysis(&text))
    }

    async fn generate_reply(
        &self,
        category: Category,
        priority: u8,
        subject: &str,
        snippet: &str,
    ) -> Result<String, ClassifierError> {
        let prompt = build_reply_prompt(category, priority, subject, snippet);
        let text = self.generate(&prompt).await?;
        Ok(text.trim().to_string())
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_analysis_prompt(subject: &str, snippet: &str) -> String {
    format!(
        "Analyze this email:\n\
         Subject: {subject}\n\
         Content: {snippet}\n\n\
         Provide analysis in JSON format with these fields:\n\
         - category: one of [urgent, meeting, inquiry, follow_up, general]\n\
         - priority: number 0-3\n\
         - requires_attention: boolean\n\
         - intent: brief description of email's purpose\n\
         - suggested_response: brief template for response"
    )
}

fn build_reply_prompt(category: Category, priority: u8, subject: &str, snippet: &str) -> String {
    format!(
        "Generate a response for this email:\n\
         Category: {category}\n\
         Priority: {priority}\n\
         Subject: {subject}\n\
         Content: {snippet}\n\n\
         Generate a professional, concise response that:\n\
         1. Acknowledges the email's purpose\n\
         2. Provides appropriate level of urgency\n\
         3. Maintains professional tone\n\
         4. Is specific to the email's category"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_includes_message_and_fields() {
        let prompt = build_analysis_prompt("Server down", "urgent help needed");
        assert!(prompt.contains("Subject: Server down"));
        assert!(prompt.contains("Content: urgent help needed"));
        assert!(prompt.contains("category"));
        assert!(prompt.contains("priority"));
        assert!(prompt.contains("requires_attention"));
        assert!(prompt.contains("suggested_response"));
    }

    #[test]
    fn reply_prompt_includes_classification() {
        let prompt = build_reply_prompt(Category::Urgent, 3, "Server down", "help");
        assert!(prompt.contains("Category: urgent"));
        assert!(prompt.contains("Priority: 3"));
        assert!(prompt.contains("Subject: Server down"));
    }

    #[test]
    fn classifier_construction_strips_trailing_slash() {
        let config = ClassifierConfig {
            base_url: "http://localhost:11434/".to_string(),
            model: "gemma3:4b".to_string(),
        };
        let classifier = OllamaClassifier::new(&config);
        assert_eq!(classifier.base_url, "http://localhost:11434");
    }
}
