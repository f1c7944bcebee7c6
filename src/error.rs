//! Error types for the inbox agent.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail gateway error: {0}")]
    Mail(#[from] MailError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail provider errors.
///
/// These propagate unmodified out of the gateway. A mail error ends the
/// current polling cycle; the dispatch loop is retried on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("Authentication failed for {user}")]
    AuthFailed { user: String },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Send to {to} failed: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Blocking mail task panicked: {0}")]
    TaskPanicked(String),
}

/// Classifier backend errors.
///
/// These never surface past the store boundary — the store substitutes
/// the default analysis instead (the gateway fails open to defaults).
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Model request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
