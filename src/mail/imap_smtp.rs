//! IMAP/SMTP mail gateway — raw IMAP over rustls for inbound, lettre
//! for outbound. Both sides are blocking and run under `spawn_blocking`.
//!
//! Inbound fetches use `BODY.PEEK[]` so listing unread mail does not
//! change message flags on the server.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::MessageParser;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::MailConfig;
use crate::error::MailError;
use crate::mail::{DeliveryReceipt, MailGateway, RawMessage};

/// Maximum snippet length in characters.
const SNIPPET_MAX_CHARS: usize = 200;

/// Mail gateway speaking IMAP (inbound) and SMTP (outbound).
pub struct ImapSmtpGateway {
    config: MailConfig,
}

impl ImapSmtpGateway {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailGateway for ImapSmtpGateway {
    async fn list_unread(&self, max_results: usize) -> Result<Vec<RawMessage>, MailError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unread(&config, max_results))
            .await
            .map_err(|e| MailError::TaskPanicked(e.to_string()))?
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, MailError> {
        let config = self.config.clone();
        let (to, subject, body) = (to.to_string(), subject.to_string(), body.to_string());
        tokio::task::spawn_blocking(move || smtp_send(&config, &to, &subject, &body))
            .await
            .map_err(|e| MailError::TaskPanicked(e.to_string()))?
    }
}

// ── Outbound (SMTP via lettre) ──────────────────────────────────────

fn smtp_send(
    config: &MailConfig,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<DeliveryReceipt, MailError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::relay(&config.smtp_host)
        .map_err(|e| MailError::Connect {
            host: config.smtp_host.clone(),
            reason: e.to_string(),
        })?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    let email = Message::builder()
        .from(
            config
                .from_address
                .parse()
                .map_err(|e| MailError::InvalidAddress {
                    address: config.from_address.clone(),
                    reason: format!("{e}"),
                })?,
        )
        .to(to.parse().map_err(|e| MailError::InvalidAddress {
            address: to.to_string(),
            reason: format!("{e}"),
        })?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| MailError::SendFailed {
            to: to.to_string(),
            reason: format!("failed to build message: {e}"),
        })?;

    let response = transport.send(&email).map_err(|e| MailError::SendFailed {
        to: to.to_string(),
        reason: e.to_string(),
    })?;

    tracing::info!(to, "Reply sent");

    Ok(DeliveryReceipt {
        to: to.to_string(),
        response: response.code().to_string(),
    })
}

// ── Inbound (raw IMAP over rustls) ──────────────────────────────────

/// A tagged IMAP session over TLS.
struct ImapSession {
    stream: rustls::StreamOwned<rustls::ClientConnection, TcpStream>,
    tag: u32,
}

impl ImapSession {
    fn connect(config: &MailConfig) -> Result<Self, MailError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port)).map_err(|e| {
            MailError::Connect {
                host: config.imap_host.clone(),
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))
            .map_err(|e| MailError::Fetch(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
            .map_err(|e| MailError::Connect {
                host: config.imap_host.clone(),
                reason: e.to_string(),
            })?;
        let conn =
            rustls::ClientConnection::new(tls_config, server_name).map_err(|e| {
                MailError::Connect {
                    host: config.imap_host.clone(),
                    reason: e.to_string(),
                }
            })?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            tag: 0,
        };
        // Server greeting
        session.read_line()?;
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(&mut self.stream, &mut byte) {
                Ok(0) => return Err(MailError::Fetch("connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(MailError::Fetch(e.to_string())),
            }
        }
    }

    /// Send one command and collect response lines up to the tagged
    /// completion line (inclusive).
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, MailError> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        let full = format!("{tag} {cmd}\r\n");
        IoWrite::write_all(&mut self.stream, full.as_bytes())
            .and_then(|()| IoWrite::flush(&mut self.stream))
            .map_err(|e| MailError::Fetch(e.to_string()))?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }
}

/// Fetch unread messages (blocking — run in `spawn_blocking`).
fn fetch_unread(config: &MailConfig, max_results: usize) -> Result<Vec<RawMessage>, MailError> {
    let mut session = ImapSession::connect(config)?;

    let login = session.command(&format!(
        "LOGIN \"{}\" \"{}\"",
        config.username,
        config.password.expose_secret()
    ))?;
    if !login.last().is_some_and(|l| l.contains("OK")) {
        return Err(MailError::AuthFailed {
            user: config.username.clone(),
        });
    }

    session.command("SELECT \"INBOX\"")?;

    let search = session.command("SEARCH UNSEEN")?;
    let mut uids: Vec<String> = Vec::new();
    for line in &search {
        if line.starts_with("* SEARCH") {
            uids.extend(line.split_whitespace().skip(2).map(str::to_string));
        }
    }
    uids.truncate(max_results);

    let mut results = Vec::new();
    for uid in &uids {
        // PEEK keeps the \Seen flag untouched
        let fetch = session.command(&format!("FETCH {uid} (BODY.PEEK[])"))?;
        let raw: String = fetch
            .iter()
            .skip(1)
            .take(fetch.len().saturating_sub(3))
            .cloned()
            .collect();

        if let Some(record) = parse_rfc822(&raw) {
            results.push(record);
        } else {
            tracing::warn!(uid = %uid, "Skipping unparseable message");
        }
    }

    session.command("LOGOUT").ok();

    Ok(results)
}

/// Convert one raw RFC 822 message into the gateway record shape.
fn parse_rfc822(raw: &str) -> Option<RawMessage> {
    let parsed = MessageParser::default().parse(raw.as_bytes())?;

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .map(|a| match (a.name(), a.address()) {
            (Some(name), Some(address)) => format!("{name} <{address}>"),
            (None, Some(address)) => address.to_string(),
            _ => "unknown".to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string());

    let subject = parsed.subject().unwrap_or("(no subject)").to_string();

    let body = parsed
        .body_text(0)
        .map(|t| t.to_string())
        .or_else(|| parsed.body_html(0).map(|h| strip_html(h.as_ref())))
        .unwrap_or_else(|| "(no readable content)".to_string());
    let snippet: String = body.chars().take(SNIPPET_MAX_CHARS).collect();

    let id = parsed
        .message_id()
        .map(str::to_string)
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let received_at = parsed.date().and_then(|d| {
        chrono::NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))
            .and_then(|date| {
                date.and_hms_opt(u32::from(d.hour), u32::from(d.minute), u32::from(d.second))
            })
            .map(|naive| naive.and_utc())
    });

    Some(RawMessage {
        id,
        sender,
        subject,
        snippet: snippet.trim().to_string(),
        received_at,
    })
}

/// Strip HTML tags from content (basic) and normalize whitespace.
fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Message-ID: <abc123@mail.example.com>\r\n\
        From: Bob Example <b@x.com>\r\n\
        To: me@example.com\r\n\
        Subject: Server down\r\n\
        Date: Tue, 01 Jul 2025 09:30:00 +0000\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        urgent help needed\r\n";

    #[test]
    fn parse_rfc822_basic_fields() {
        let record = parse_rfc822(SAMPLE).unwrap();
        assert_eq!(record.id, "abc123@mail.example.com");
        assert_eq!(record.sender, "Bob Example <b@x.com>");
        assert_eq!(record.subject, "Server down");
        assert_eq!(record.snippet, "urgent help needed");
        let ts = record.received_at.unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-07-01T09:30:00+00:00");
    }

    #[test]
    fn parse_rfc822_missing_subject() {
        let raw = "From: a@x.com\r\n\r\nhello\r\n";
        let record = parse_rfc822(raw).unwrap();
        assert_eq!(record.subject, "(no subject)");
        assert_eq!(record.sender, "a@x.com");
    }

    #[test]
    fn parse_rfc822_generates_id_when_missing() {
        let raw = "From: a@x.com\r\nSubject: Hi\r\n\r\nhello\r\n";
        let record = parse_rfc822(raw).unwrap();
        assert!(record.id.starts_with("gen-"));
    }

    #[test]
    fn parse_rfc822_truncates_snippet() {
        let long_body = "word ".repeat(200);
        let raw = format!("From: a@x.com\r\nSubject: Long\r\n\r\n{long_body}\r\n");
        let record = parse_rfc822(&raw).unwrap();
        assert!(record.snippet.chars().count() <= SNIPPET_MAX_CHARS);
    }

    #[test]
    fn strip_html_removes_tags() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn strip_html_normalizes_whitespace() {
        assert_eq!(strip_html("<p>  Hello\n\n  World  </p>"), "Hello World");
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No markup"), "No markup");
    }
}
