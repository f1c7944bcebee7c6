//! Configuration types, built from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Mail provider configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl MailConfig {
    /// Build config from environment variables.
    ///
    /// `INBOX_IMAP_HOST` is required; everything else has a usable default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = std::env::var("INBOX_IMAP_HOST")
            .map_err(|_| ConfigError::MissingEnvVar("INBOX_IMAP_HOST".into()))?;

        let imap_port: u16 = std::env::var("INBOX_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host =
            std::env::var("INBOX_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("INBOX_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("INBOX_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("INBOX_PASSWORD").unwrap_or_default());
        let from_address =
            std::env::var("INBOX_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Ok(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

/// Classifier backend configuration (local Ollama instance).
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub model: String,
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "gemma3:4b".to_string());
        Self { base_url, model }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3:4b".to_string(),
        }
    }
}

/// Agent-level settings for the polling loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Seconds between polling cycles.
    pub poll_interval_secs: u64,
    /// Maximum unread records fetched per cycle.
    pub max_results: usize,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let poll_interval_secs: u64 = std::env::var("INBOX_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let max_results: usize = std::env::var("INBOX_MAX_RESULTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Self {
            poll_interval_secs,
            max_results,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            max_results: 10,
        }
    }
}
