// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end testing.
//!
//! `TestHarness` assembles the ledger, reconciler and dispatcher on a
//! temporary SQLite file with mock adapters, and exposes the same entry
//! points the binary drives: `handle_message` and `handle_event`.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use tollgate_core::{InboundMessage, TollgateError, UserId};
use tollgate_dispatch::{DispatchSettings, Dispatcher, DrainReport};
use tollgate_ledger::{AccountLedger, AdmissionPolicy, PackageCatalog, RateTable};
use tollgate_payments::{DummyGateway, PaymentEvent, ReconcileOutcome, Reconciler};
use tollgate_storage::Database;

use crate::mock_channel::MockChannel;
use crate::mock_provider::MockProvider;

/// Builder for test environments.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    provider_delay: Option<Duration>,
    free_daily_limit: u32,
    per_request_cost_cents: i64,
    settings: DispatchSettings,
    today: Option<NaiveDate>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            provider_delay: None,
            free_daily_limit: 10,
            per_request_cost_cents: 10,
            settings: DispatchSettings {
                timeout: Duration::from_secs(5),
                drain_timeout: Duration::from_secs(5),
                ..DispatchSettings::default()
            },
            today: None,
        }
    }

    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_provider_delay(mut self, delay: Duration) -> Self {
        self.provider_delay = Some(delay);
        self
    }

    pub fn with_quota(mut self, free_daily_limit: u32, per_request_cost_cents: i64) -> Self {
        self.free_daily_limit = free_daily_limit;
        self.per_request_cost_cents = per_request_cost_cents;
        self
    }

    pub fn with_dispatch(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Pin the ledger's notion of "today".
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub async fn build(self) -> Result<TestHarness, TollgateError> {
        let temp_dir = tempfile::TempDir::new().map_err(TollgateError::storage)?;
        let db_path = temp_dir.path().join("tollgate.db");
        let db = Database::open(&db_path.to_string_lossy(), true).await?;

        let mut ledger = AccountLedger::new(
            db.clone(),
            AdmissionPolicy::new(self.free_daily_limit, self.per_request_cost_cents),
        );
        if let Some(today) = self.today {
            ledger = ledger.with_clock(move || today);
        }
        let ledger = Arc::new(ledger);

        let mut provider = MockProvider::with_responses(self.responses);
        if let Some(delay) = self.provider_delay {
            provider = provider.with_delay(delay);
        }
        let provider = Arc::new(provider);
        let channel = Arc::new(MockChannel::new());

        let reconciler = Arc::new(
            Reconciler::new(
                ledger.clone(),
                PackageCatalog::default(),
                RateTable::default(),
                Arc::new(DummyGateway::new(
                    "https://pay.test/success?session_id={CHECKOUT_SESSION_ID}",
                )),
            )
            .with_notifier(channel.clone()),
        );

        let dispatcher = Dispatcher::start(
            ledger.clone(),
            reconciler.clone(),
            provider.clone(),
            channel.clone(),
            self.settings,
        );

        Ok(TestHarness {
            db,
            ledger,
            reconciler,
            dispatcher,
            provider,
            channel,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired engine over mocks.
pub struct TestHarness {
    pub db: Database,
    pub ledger: Arc<AccountLedger>,
    pub reconciler: Arc<Reconciler>,
    pub dispatcher: Dispatcher,
    pub provider: Arc<MockProvider>,
    pub channel: Arc<MockChannel>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default quota (10 free, 10 cents per request).
    pub async fn new() -> Result<Self, TollgateError> {
        Self::builder().build().await
    }

    /// Sends a chat message as `user`.
    pub async fn send(&self, user: &str, text: &str) {
        self.dispatcher
            .handle_message(InboundMessage::new(user, user, text))
            .await;
    }

    /// Waits until the dispatcher has no queued or running jobs.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let stats = self.dispatcher.stats();
                if stats.queued == 0 && stats.in_flight == 0 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Sends a message and waits for its job to finish.
    pub async fn send_and_settle(&self, user: &str, text: &str) {
        self.send(user, text).await;
        self.wait_idle(Duration::from_secs(10)).await;
    }

    /// Reports an in-chat invoice as paid for its issued amount.
    pub async fn pay_invoice(&self, token: &str) -> Option<ReconcileOutcome> {
        let pending = self.reconciler.pre_checkout(token).await.ok()?;
        self.reconciler
            .handle_event(PaymentEvent::InvoicePaid {
                token: token.to_string(),
                total_amount: pending.amount_minor,
                currency: pending.currency,
            })
            .await
    }

    pub async fn balance_cents(&self, user: &str) -> i64 {
        self.ledger
            .account(&UserId::from(user))
            .await
            .ok()
            .flatten()
            .map(|a| a.balance_cents)
            .unwrap_or(0)
    }

    pub async fn shutdown(&self) -> DrainReport {
        self.dispatcher.shutdown(Duration::from_secs(10)).await
    }
}
