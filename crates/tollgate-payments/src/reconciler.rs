// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The payment reconciler.
//!
//! Every purchase becomes a `pending_payments` row keyed by its token before
//! the user is sent anywhere. Completion, from either channel, goes through
//! [`Reconciler::reconcile`], whose compare-and-set transaction guarantees a
//! single credit per token.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use tollgate_config::model::PaymentsConfig;
use tollgate_core::{
    ChannelAdapter, CheckoutGateway, CheckoutRequest, Invoice, OutboundMessage, Package,
    PaymentChannel, PaymentStatus, TollgateError, UserId, format_cents,
};
use tollgate_ledger::{AccountLedger, AccountSummary, PackageCatalog, RateTable, pricing};
use tollgate_storage::PendingPayment;
use tollgate_storage::queries::payments::{self, Completion, CompletionResult};

use crate::events::{PaymentEvent, ReconcileOutcome};

/// A hosted checkout the user should be redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutStart {
    pub session_id: String,
    pub url: String,
    pub package: Package,
}

/// Issues payment tokens and settles them against the ledger.
pub struct Reconciler {
    ledger: Arc<AccountLedger>,
    catalog: PackageCatalog,
    rates: RateTable,
    gateway: Arc<dyn CheckoutGateway>,
    notifier: Option<Arc<dyn ChannelAdapter>>,
    checkout_currency: String,
    invoice_currency: String,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<AccountLedger>,
        catalog: PackageCatalog,
        rates: RateTable,
        gateway: Arc<dyn CheckoutGateway>,
    ) -> Self {
        let defaults = PaymentsConfig::default();
        Self {
            ledger,
            catalog,
            rates,
            gateway,
            notifier: None,
            checkout_currency: defaults.checkout_currency,
            invoice_currency: defaults.invoice_currency,
        }
    }

    /// Builds a reconciler from the `[payments]` section.
    pub fn from_config(
        ledger: Arc<AccountLedger>,
        config: &PaymentsConfig,
        gateway: Arc<dyn CheckoutGateway>,
    ) -> Self {
        Self::new(
            ledger,
            PackageCatalog::from_config(config),
            RateTable::from_config(config),
            gateway,
        )
        .with_currencies(&config.checkout_currency, &config.invoice_currency)
    }

    pub fn with_currencies(mut self, checkout: &str, invoice: &str) -> Self {
        self.checkout_currency = checkout.to_ascii_uppercase();
        self.invoice_currency = invoice.to_ascii_uppercase();
        self
    }

    /// Channel used to tell users about credited payments.
    pub fn with_notifier(mut self, channel: Arc<dyn ChannelAdapter>) -> Self {
        self.notifier = Some(channel);
        self
    }

    pub fn catalog(&self) -> &PackageCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &Arc<AccountLedger> {
        &self.ledger
    }

    pub fn invoice_currency(&self) -> &str {
        &self.invoice_currency
    }

    /// Opens a hosted checkout session for a package.
    ///
    /// The package is resolved before the gateway is called, so an unknown
    /// id leaves no trace anywhere.
    pub async fn start_checkout(
        &self,
        user_id: &UserId,
        package_id: &str,
    ) -> Result<CheckoutStart, TollgateError> {
        let package = self.catalog.get(package_id)?.clone();
        let session = self
            .gateway
            .create_session(CheckoutRequest {
                user_id: user_id.clone(),
                package: package.clone(),
                amount_minor: package.checkout_price_cents,
                currency: self.checkout_currency.clone(),
            })
            .await?;

        payments::insert_pending(
            self.ledger.database(),
            &pending(
                &session.session_id,
                user_id,
                &package,
                PaymentChannel::Checkout,
                package.checkout_price_cents,
                &self.checkout_currency,
            ),
        )
        .await?;

        info!(
            user_id = %user_id,
            package = %package.id,
            token = %session.session_id,
            "checkout started"
        );
        Ok(CheckoutStart {
            session_id: session.session_id,
            url: session.url,
            package,
        })
    }

    /// Issues an in-chat invoice for a package. The caller sends it.
    pub async fn start_invoice(
        &self,
        user_id: &UserId,
        package_id: &str,
    ) -> Result<Invoice, TollgateError> {
        let package = self.catalog.get(package_id)?.clone();
        let token = uuid::Uuid::new_v4().to_string();

        payments::insert_pending(
            self.ledger.database(),
            &pending(
                &token,
                user_id,
                &package,
                PaymentChannel::Invoice,
                package.invoice_price_minor,
                &self.invoice_currency,
            ),
        )
        .await?;

        info!(user_id = %user_id, package = %package.id, token = %token, "invoice issued");
        Ok(Invoice {
            token,
            title: format!("{} requests", package.requests),
            description: format!("Top up your balance with {} AI requests", package.requests),
            amount_minor: package.invoice_price_minor,
            currency: self.invoice_currency.clone(),
            package,
        })
    }

    /// Answers a pre-checkout query: the token must exist and still be pending.
    pub async fn pre_checkout(&self, token: &str) -> Result<PendingPayment, TollgateError> {
        let payment = payments::get_pending(self.ledger.database(), token)
            .await?
            .ok_or_else(|| TollgateError::UnknownPaymentToken(token.to_string()))?;
        if payment.status != PaymentStatus::Pending {
            return Err(not_pending(&payment));
        }
        Ok(payment)
    }

    /// Completes a token and credits its owner, at most once.
    ///
    /// Reporting an already completed token again is a successful no-op.
    pub async fn reconcile(&self, token: &str) -> Result<ReconcileOutcome, TollgateError> {
        let db = self.ledger.database();
        let Some(payment) = payments::get_pending(db, token).await? else {
            warn!(token = %token, "reconcile for unknown payment token");
            return Err(TollgateError::UnknownPaymentToken(token.to_string()));
        };
        match payment.status {
            PaymentStatus::Completed => {
                debug!(token = %token, "payment already completed");
                return Ok(ReconcileOutcome::AlreadyCompleted {
                    user_id: payment.user_id,
                });
            }
            PaymentStatus::Failed => return Err(not_pending(&payment)),
            PaymentStatus::Pending => {}
        }

        let package = self.catalog.get(&payment.package_id).inspect_err(|_| {
            error!(
                token = %token,
                package = %payment.package_id,
                "pending payment names a package no longer in the catalog"
            );
        })?;
        let credit_cents =
            pricing::request_equivalent_cents(package, self.ledger.policy().per_request_cost_cents);
        let normalized_cents = self.rates.normalize(payment.amount_minor, &payment.currency)?;

        let completion = Completion {
            record_id: uuid::Uuid::new_v4().to_string(),
            credit_cents,
            normalized_cents,
        };

        match payments::complete_pending(db, token, completion).await? {
            CompletionResult::Completed {
                payment, account, ..
            } => {
                info!(
                    token = %token,
                    user_id = %payment.user_id,
                    package = %payment.package_id,
                    credited_cents = credit_cents,
                    normalized_cents,
                    balance_cents = account.balance_cents,
                    "payment reconciled"
                );
                Ok(ReconcileOutcome::Credited {
                    user_id: payment.user_id,
                    package_id: payment.package_id,
                    credited_cents: credit_cents,
                    balance_cents: account.balance_cents,
                })
            }
            // Lost the race to a concurrent completion.
            CompletionResult::AlreadyCompleted(payment) => {
                debug!(token = %token, "payment completed concurrently");
                Ok(ReconcileOutcome::AlreadyCompleted {
                    user_id: payment.user_id,
                })
            }
            CompletionResult::NotPending(payment) => Err(not_pending(&payment)),
            CompletionResult::NotFound => {
                Err(TollgateError::UnknownPaymentToken(token.to_string()))
            }
        }
    }

    /// Marks a pending token failed. Returns the token's resulting status.
    pub async fn mark_failed(&self, token: &str) -> Result<PaymentStatus, TollgateError> {
        let status = payments::mark_failed(self.ledger.database(), token)
            .await?
            .ok_or_else(|| TollgateError::UnknownPaymentToken(token.to_string()))?;
        info!(token = %token, status = %status, "payment failure recorded");
        Ok(status)
    }

    /// Applies a payment notification. Never fails; problems are logged.
    ///
    /// Returns the reconcile outcome for completion events that succeeded.
    pub async fn handle_event(&self, event: PaymentEvent) -> Option<ReconcileOutcome> {
        debug!(kind = event.kind(), token = %event.token(), "payment event received");
        match event {
            PaymentEvent::CheckoutFailed { session_id } => {
                if let Err(e) = self.mark_failed(&session_id).await {
                    warn!(token = %session_id, error = %e, "could not record checkout failure");
                }
                None
            }
            PaymentEvent::CheckoutCompleted { session_id } => self.settle(&session_id).await,
            PaymentEvent::InvoicePaid {
                token,
                total_amount,
                currency,
            } => {
                self.check_paid_amount(&token, total_amount, &currency).await;
                self.settle(&token).await
            }
        }
    }

    async fn settle(&self, token: &str) -> Option<ReconcileOutcome> {
        match self.reconcile(token).await {
            Ok(outcome) => {
                if let ReconcileOutcome::Credited { user_id, .. } = &outcome {
                    self.notify_credited(user_id, token).await;
                }
                Some(outcome)
            }
            Err(e) => {
                warn!(token = %token, error = %e, "payment event not applied");
                None
            }
        }
    }

    /// The platform reports what was charged; it should match what was issued.
    async fn check_paid_amount(&self, token: &str, total_amount: i64, currency: &str) {
        let Ok(Some(payment)) = payments::get_pending(self.ledger.database(), token).await else {
            return;
        };
        if payment.amount_minor != total_amount || !payment.currency.eq_ignore_ascii_case(currency)
        {
            warn!(
                token = %token,
                expected_amount = payment.amount_minor,
                expected_currency = %payment.currency,
                paid_amount = total_amount,
                paid_currency = %currency,
                "invoice amount mismatch"
            );
        }
    }

    async fn notify_credited(&self, user_id: &UserId, token: &str) {
        let Some(channel) = &self.notifier else {
            return;
        };
        let summary = match self.ledger.summary(user_id).await {
            Ok(Some(summary)) => summary,
            Ok(None) => return,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "could not read account for payment notice");
                return;
            }
        };
        let requests = payments::get_pending(self.ledger.database(), token)
            .await
            .ok()
            .flatten()
            .and_then(|p| self.catalog.get(&p.package_id).ok().map(|pkg| pkg.requests));

        let text = payment_notice(&summary, requests);
        if let Err(e) = channel
            .deliver(OutboundMessage::new(user_id.clone(), text))
            .await
        {
            warn!(user_id = %user_id, error = %e, "payment notice delivery failed");
        }
    }
}

/// User-facing confirmation of a credited payment.
pub fn payment_notice(summary: &AccountSummary, requests_added: Option<u32>) -> String {
    let mut text = String::from("Payment received, thank you!\n");
    if let Some(n) = requests_added {
        text.push_str(&format!("{n} requests added.\n"));
    }
    text.push_str(&format!(
        "Balance: {} ({} paid requests)\nFree requests left today: {}/{}",
        format_cents(summary.account.balance_cents),
        summary.paid_requests_left,
        summary.remaining_free,
        summary.free_daily_limit,
    ));
    text
}

fn pending(
    token: &str,
    user_id: &UserId,
    package: &Package,
    channel: PaymentChannel,
    amount_minor: i64,
    currency: &str,
) -> PendingPayment {
    PendingPayment {
        token: token.to_string(),
        user_id: user_id.clone(),
        package_id: package.id.clone(),
        channel,
        amount_minor,
        currency: currency.to_string(),
        status: PaymentStatus::Pending,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

fn not_pending(payment: &PendingPayment) -> TollgateError {
    TollgateError::PaymentNotPending {
        token: payment.token.clone(),
        status: payment.status.to_string(),
    }
}
