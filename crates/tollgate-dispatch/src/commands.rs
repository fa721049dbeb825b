// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash command routing.
//!
//! Commands are answered inline: none of them calls the completion provider
//! or touches quota.

use std::sync::Arc;

use tracing::{info, warn};

use tollgate_core::{ChannelAdapter, InboundMessage, OutboundMessage, TollgateError, UserId};
use tollgate_ledger::AccountLedger;
use tollgate_payments::Reconciler;
use tollgate_storage::queries::usage;

use crate::messages;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Stats,
    Payment,
    Buy(String),
    Unknown(String),
}

impl Command {
    /// Parses `text` as a command. Returns `None` for ordinary text.
    ///
    /// Accepts the `/cmd@botname` form and ignores trailing arguments.
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.trim_start().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        if name.is_empty() {
            return None;
        }
        Some(match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "stats" => Command::Stats,
            "payment" => Command::Payment,
            other => match other.strip_prefix("buy_") {
                Some(id) if !id.is_empty() => Command::Buy(id.to_string()),
                _ => Command::Unknown(other.to_string()),
            },
        })
    }
}

/// Answers chat commands.
pub struct CommandRouter {
    ledger: Arc<AccountLedger>,
    reconciler: Arc<Reconciler>,
    channel: Arc<dyn ChannelAdapter>,
}

impl CommandRouter {
    pub fn new(
        ledger: Arc<AccountLedger>,
        reconciler: Arc<Reconciler>,
        channel: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self {
            ledger,
            reconciler,
            channel,
        }
    }

    /// Handles one command. Failures are reported to the user and logged.
    pub async fn handle(&self, msg: &InboundMessage, command: Command) {
        info!(user_id = %msg.user_id, command = ?command, "command received");
        let user_id = &msg.user_id;
        let policy = self.ledger.policy();

        match command {
            Command::Start => {
                if let Err(e) = self.ledger.get_or_create(user_id, &msg.display_name).await {
                    warn!(user_id = %user_id, error = %e, "could not open account on /start");
                }
                self.reply(
                    user_id,
                    messages::welcome(&msg.display_name, policy.free_daily_limit),
                )
                .await;
            }
            Command::Help => {
                self.reply(
                    user_id,
                    messages::help(
                        self.reconciler.catalog(),
                        policy.free_daily_limit,
                        self.reconciler.invoice_currency(),
                    ),
                )
                .await;
            }
            Command::Stats => {
                let text = match self.stats(msg).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "stats lookup failed");
                        messages::STATS_UNAVAILABLE.to_string()
                    }
                };
                self.reply(user_id, text).await;
            }
            Command::Payment => {
                self.reply(
                    user_id,
                    messages::catalog(
                        self.reconciler.catalog(),
                        self.reconciler.invoice_currency(),
                    ),
                )
                .await;
            }
            Command::Buy(package_id) => self.buy(user_id, &package_id).await,
            Command::Unknown(name) => {
                warn!(user_id = %user_id, command = %name, "unknown command");
                self.reply(user_id, messages::UNKNOWN_COMMAND).await;
            }
        }
    }

    async fn stats(&self, msg: &InboundMessage) -> Result<String, TollgateError> {
        self.ledger
            .get_or_create(&msg.user_id, &msg.display_name)
            .await?;
        let summary = self
            .ledger
            .summary(&msg.user_id)
            .await?
            .ok_or_else(|| TollgateError::AccountNotFound(msg.user_id.to_string()))?;
        let (_, _, spent_cents) =
            usage::totals_for_user(self.ledger.database(), &msg.user_id).await?;
        Ok(messages::stats(&summary, spent_cents))
    }

    async fn buy(&self, user_id: &UserId, package_id: &str) {
        let invoice = match self.reconciler.start_invoice(user_id, package_id).await {
            Ok(invoice) => invoice,
            Err(TollgateError::UnknownPackage(id)) => {
                warn!(user_id = %user_id, package = %id, "purchase of unknown package");
                self.reply(
                    user_id,
                    messages::unknown_package(&id, self.reconciler.catalog()),
                )
                .await;
                return;
            }
            Err(e) => {
                warn!(user_id = %user_id, package = %package_id, error = %e, "invoice creation failed");
                self.reply(user_id, messages::INVOICE_FAILED).await;
                return;
            }
        };
        if let Err(e) = self.channel.deliver_invoice(user_id, &invoice).await {
            warn!(user_id = %user_id, token = %invoice.token, error = %e, "invoice delivery failed");
        }
    }

    async fn reply(&self, user_id: &UserId, text: impl Into<String>) {
        if let Err(e) = self
            .channel
            .deliver(OutboundMessage::new(user_id.clone(), text))
            .await
        {
            warn!(user_id = %user_id, error = %e, "command reply delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_ledger::{AdmissionPolicy, PackageCatalog, RateTable};
    use tollgate_payments::DummyGateway;
    use tollgate_storage::Database;
    use tollgate_storage::queries::payments;
    use tollgate_test_utils::MockChannel;

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /help please"), Some(Command::Help));
        assert_eq!(Command::parse("/stats@tollgate_bot"), Some(Command::Stats));
        assert_eq!(Command::parse("/payment"), Some(Command::Payment));
        assert_eq!(Command::parse("/buy_50"), Some(Command::Buy("50".into())));
        assert_eq!(Command::parse("/buy_"), Some(Command::Unknown("buy_".into())));
        assert_eq!(Command::parse("/frobnicate"), Some(Command::Unknown("frobnicate".into())));
        assert_eq!(Command::parse("hello /start"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(Command::parse(""), None);
    }

    async fn router() -> (CommandRouter, Arc<MockChannel>, Arc<Reconciler>) {
        let db = Database::open_in_memory().await.unwrap();
        let ledger = Arc::new(AccountLedger::new(db, AdmissionPolicy::new(10, 10)));
        let reconciler = Arc::new(Reconciler::new(
            ledger.clone(),
            PackageCatalog::default(),
            RateTable::default(),
            Arc::new(DummyGateway::new("https://pay.test/ok")),
        ));
        let channel = Arc::new(MockChannel::new());
        (
            CommandRouter::new(ledger, reconciler.clone(), channel.clone()),
            channel,
            reconciler,
        )
    }

    fn msg(text: &str) -> InboundMessage {
        InboundMessage::new("7", "Ada", text)
    }

    #[tokio::test]
    async fn start_greets_and_opens_account() {
        let (router, channel, reconciler) = router().await;
        router.handle(&msg("/start"), Command::Start).await;
        let sent = channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.contains("Welcome, Ada!"));
        assert!(sent[0].content.contains("10 free requests"));
        assert!(
            reconciler
                .ledger()
                .account(&UserId::from("7"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn buy_sends_invoice_with_pending_token() {
        let (router, channel, reconciler) = router().await;
        router.handle(&msg("/buy_50"), Command::Buy("50".into())).await;

        let invoices = channel.invoices().await;
        assert_eq!(invoices.len(), 1);
        let (user, invoice) = &invoices[0];
        assert_eq!(user, &UserId::from("7"));
        assert_eq!(invoice.package.requests, 50);

        let pending = payments::get_pending(reconciler.ledger().database(), &invoice.token)
            .await
            .unwrap();
        assert!(pending.is_some());
    }

    #[tokio::test]
    async fn buy_unknown_package_lists_options() {
        let (router, channel, _) = router().await;
        router.handle(&msg("/buy_3"), Command::Buy("3".into())).await;
        assert!(channel.invoices().await.is_empty());
        let sent = channel.sent_messages().await;
        assert!(sent[0].content.contains("/buy_10, /buy_50, /buy_100"));
    }

    #[tokio::test]
    async fn stats_for_new_user() {
        let (router, channel, _) = router().await;
        router.handle(&msg("/stats"), Command::Stats).await;
        let sent = channel.sent_messages().await;
        assert!(sent[0].content.contains("0/10 used, 10 left"));
        assert!(sent[0].content.contains("Balance: $0.00"));
    }

    #[tokio::test]
    async fn unknown_command_points_to_help() {
        let (router, channel, _) = router().await;
        router
            .handle(&msg("/nope"), Command::Unknown("nope".into()))
            .await;
        assert_eq!(
            channel.sent_messages().await[0].content,
            messages::UNKNOWN_COMMAND
        );
    }
}
