// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate shell` command implementation.
//!
//! Launches an interactive REPL that plays the chat platform: each line is
//! an inbound message from user `local`, replies are printed by a console
//! channel, and `/pay <token>` stands in for the payment platform's
//! completion callback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use tollgate_config::TollgateConfig;
use tollgate_core::{
    AdapterType, ChannelAdapter, HealthStatus, InboundMessage, Invoice, OutboundMessage,
    PaymentChannel, PluginAdapter, TollgateError, UserId, format_cents,
};
use tollgate_dispatch::messages::format_minor;
use tollgate_dispatch::{
    DispatchSettings, Dispatcher, RetryingChannel, install_signal_handler,
};
use tollgate_openai::OpenAiProvider;
use tollgate_payments::{PaymentEvent, ReconcileOutcome, Reconciler};

use crate::admin::Engine;

/// The single shell user.
const LOCAL_USER: &str = "local";

/// Channel adapter that prints replies to the terminal.
pub struct ConsoleChannel;

#[async_trait]
impl PluginAdapter for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ChannelAdapter for ConsoleChannel {
    async fn deliver(&self, msg: OutboundMessage) -> Result<(), TollgateError> {
        println!("{} {}", "tollgate>".cyan(), msg.content);
        Ok(())
    }

    async fn deliver_invoice(
        &self,
        _user_id: &UserId,
        invoice: &Invoice,
    ) -> Result<(), TollgateError> {
        println!("{} {}", "invoice>".magenta(), invoice.title.bold());
        println!("         {}", invoice.description);
        println!(
            "         {}",
            format_minor(invoice.amount_minor, &invoice.currency)
        );
        println!(
            "         {}",
            format!("pay with: /pay {}", invoice.token).dimmed()
        );
        Ok(())
    }
}

/// Runs the `tollgate shell` interactive REPL.
pub async fn run_shell(config: TollgateConfig) -> Result<(), TollgateError> {
    let channel: Arc<dyn ChannelAdapter> = Arc::new(RetryingChannel::from_config(
        Arc::new(ConsoleChannel),
        &config.dispatch,
    ));
    let engine = Engine::open(&config, Some(channel.clone())).await?;

    let provider = Arc::new(OpenAiProvider::new(&config.provider));
    match provider.health_check().await {
        Ok(HealthStatus::Healthy) => {}
        Ok(HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason)) => {
            warn!(provider = %provider.label(), reason = %reason, "provider not ready");
            eprintln!(
                "{}",
                format!("provider not ready ({reason}); requests will get the fallback reply")
                    .yellow()
            );
        }
        Err(e) => warn!(error = %e, "provider health check failed"),
    }

    let settings = DispatchSettings::from_config(&config.dispatch);
    let reply_wait = settings.timeout + Duration::from_secs(2);
    let drain_timeout = settings.drain_timeout;
    let dispatcher = Dispatcher::start(
        engine.ledger.clone(),
        engine.reconciler.clone(),
        provider,
        channel,
        settings,
    );
    let shutdown = install_signal_handler();

    let mut rl = DefaultEditor::new()
        .map_err(|e| TollgateError::Internal(format!("failed to initialize readline: {e}")))?;

    let display_name = std::env::var("USER").unwrap_or_else(|_| LOCAL_USER.to_string());
    println!("{}", "tollgate shell".bold().green());
    println!(
        "Type {} to begin, {} to settle a payment, {} to exit.\n",
        "/start".yellow(),
        "/pay <token>".yellow(),
        "/quit".yellow()
    );

    let prompt = format!("{}> ", display_name.green());
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if let Some(token) = shell_argument(trimmed, "/pay") {
                    pay(&engine.reconciler, token).await;
                    continue;
                }
                if let Some(package_id) = shell_argument(trimmed, "/checkout") {
                    checkout(&engine.reconciler, package_id).await;
                    continue;
                }

                dispatcher
                    .handle_message(InboundMessage::new(LOCAL_USER, display_name.as_str(), trimmed))
                    .await;
                wait_for_reply(&dispatcher, reply_wait).await;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    let report = dispatcher.shutdown(drain_timeout).await;
    if !report.drained {
        eprintln!(
            "{}",
            format!(
                "{} queued and {} running request(s) cut short at shutdown",
                report.abandoned, report.interrupted
            )
            .yellow()
        );
    }
    info!(settled = report.settled, denied = report.denied, "shell session finished");

    drop(dispatcher);
    engine.close().await?;
    println!("{}", "goodbye".dimmed());
    Ok(())
}

/// Argument of a shell-only command, or `None` if `line` is something else.
/// `/payment` is a chat command and must not match `/pay`.
fn shell_argument<'a>(line: &'a str, command: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(command)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Blocks the prompt until queued work for this line is done, so replies
/// are not interleaved with the next prompt.
async fn wait_for_reply(dispatcher: &Dispatcher, limit: Duration) {
    let idle = tokio::time::timeout(limit, async {
        loop {
            let stats = dispatcher.stats();
            if stats.queued == 0 && stats.in_flight == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    if idle.is_err() {
        warn!("reply still pending; continuing");
    }
}

/// Reports a pending token as paid through the event path its channel uses.
async fn pay(reconciler: &Reconciler, token: &str) {
    if token.is_empty() {
        eprintln!("usage: /pay <token>");
        return;
    }
    let payment = match reconciler.pre_checkout(token).await {
        Ok(payment) => payment,
        Err(e) => {
            eprintln!("{}: {e}", "payment rejected".red());
            return;
        }
    };
    let event = match payment.channel {
        PaymentChannel::Invoice => PaymentEvent::InvoicePaid {
            token: payment.token,
            total_amount: payment.amount_minor,
            currency: payment.currency,
        },
        PaymentChannel::Checkout => PaymentEvent::CheckoutCompleted {
            session_id: payment.token,
        },
    };
    match reconciler.handle_event(event).await {
        Some(ReconcileOutcome::Credited { credited_cents, .. }) => {
            info!(token = %token, credited_cents, "shell payment applied");
        }
        Some(ReconcileOutcome::AlreadyCompleted { .. }) => {
            println!("{}", "payment was already applied".dimmed());
        }
        None => eprintln!("{}", "payment not applied; see logs".red()),
    }
}

/// Opens a hosted checkout for the local user and prints where to pay.
async fn checkout(reconciler: &Reconciler, package_id: &str) {
    match reconciler
        .start_checkout(&UserId::from(LOCAL_USER), package_id)
        .await
    {
        Ok(start) => {
            println!(
                "{} {} requests for {}",
                "checkout>".magenta(),
                start.package.requests,
                format_cents(start.package.checkout_price_cents)
            );
            println!("          {}", start.url);
            println!(
                "          {}",
                format!("pay with: /pay {}", start.session_id).dimmed()
            );
        }
        Err(e) => eprintln!("{}: {e}", "checkout failed".red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_ledger::{AccountLedger, AdmissionPolicy, PackageCatalog, RateTable};
    use tollgate_payments::DummyGateway;
    use tollgate_storage::Database;

    async fn reconciler() -> Reconciler {
        let db = Database::open_in_memory().await.unwrap();
        let ledger = Arc::new(AccountLedger::new(db, AdmissionPolicy::new(10, 10)));
        Reconciler::new(
            ledger,
            PackageCatalog::default(),
            RateTable::default(),
            Arc::new(DummyGateway::new("https://pay.test/{CHECKOUT_SESSION_ID}")),
        )
    }

    #[tokio::test]
    async fn pay_settles_invoices_and_checkouts() {
        let r = reconciler().await;
        let user = UserId::from(LOCAL_USER);

        let invoice = r.start_invoice(&user, "10").await.unwrap();
        pay(&r, &invoice.token).await;
        let start = r.start_checkout(&user, "50").await.unwrap();
        pay(&r, &start.session_id).await;

        let account = r.ledger().account(&user).await.unwrap().unwrap();
        assert_eq!(account.balance_cents, 600);
    }

    #[tokio::test]
    async fn pay_ignores_unknown_tokens() {
        let r = reconciler().await;
        pay(&r, "missing").await;
        pay(&r, "").await;
        assert!(r.ledger().account(&UserId::from(LOCAL_USER)).await.unwrap().is_none());
    }

    #[test]
    fn shell_commands_do_not_shadow_chat_commands() {
        assert_eq!(shell_argument("/pay abc", "/pay"), Some("abc"));
        assert_eq!(shell_argument("/pay", "/pay"), Some(""));
        assert_eq!(shell_argument("/payment", "/pay"), None);
        assert_eq!(shell_argument("/checkout 50", "/checkout"), Some("50"));
        assert_eq!(shell_argument("hello", "/pay"), None);
    }

    #[tokio::test]
    async fn console_channel_accepts_deliveries() {
        let channel = ConsoleChannel;
        channel
            .deliver(OutboundMessage::new(LOCAL_USER, "hello"))
            .await
            .unwrap();
        assert_eq!(channel.max_message_length(), 4096);
    }
}
