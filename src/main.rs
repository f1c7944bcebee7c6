use std::sync::Arc;
use std::time::Duration;

use inbox_agent::classifier::OllamaClassifier;
use inbox_agent::config::{AgentConfig, ClassifierConfig, MailConfig};
use inbox_agent::dispatch::DispatchLoop;
use inbox_agent::mail::ImapSmtpGateway;
use inbox_agent::report::{StatusReport, category_summary};
use inbox_agent::store::EmailStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mail_config = MailConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export INBOX_IMAP_HOST=imap.example.com");
        std::process::exit(1);
    });
    let classifier_config = ClassifierConfig::from_env();
    let agent_config = AgentConfig::from_env();

    eprintln!("Inbox Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   IMAP: {}:{}", mail_config.imap_host, mail_config.imap_port);
    eprintln!("   SMTP: {}:{}", mail_config.smtp_host, mail_config.smtp_port);
    eprintln!(
        "   Model: {} @ {}",
        classifier_config.model, classifier_config.base_url
    );
    eprintln!(
        "   Polling every {}s, up to {} messages per cycle",
        agent_config.poll_interval_secs, agent_config.max_results
    );
    eprintln!("   Press Ctrl+C to exit\n");

    let mail = Arc::new(ImapSmtpGateway::new(mail_config));
    let classifier = Arc::new(OllamaClassifier::new(&classifier_config));
    let store = EmailStore::new(classifier);
    let mut dispatch = DispatchLoop::new(mail, store, agent_config.max_results);

    let mut tick = tokio::time::interval(Duration::from_secs(agent_config.poll_interval_secs));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_cycle(&mut dispatch).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, shutting down");
                eprintln!("\nShutting down inbox agent");
                break;
            }
        }
    }

    Ok(())
}

/// One polling cycle plus its operator-facing report. A failed cycle is
/// logged and the loop continues on the next interval.
async fn run_cycle(dispatch: &mut DispatchLoop) {
    println!("\n{}", "=".repeat(50));
    println!("{}", StatusReport::collect(dispatch.store(), dispatch.started_at()));

    match dispatch.run_cycle().await {
        Ok(report) => {
            if report.new_messages.is_empty() {
                println!("No new emails to process.");
            }
            for result in &report.responded {
                println!(
                    "Processed email (Priority: {}, Category: {}, Attention: {})",
                    result.priority,
                    result.category,
                    if result.requires_attention {
                        "Required"
                    } else {
                        "Not Required"
                    }
                );
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Cycle failed, retrying next interval");
            println!("Cycle failed: {e}");
        }
    }

    println!("\n{}", category_summary(dispatch.store()));
}
