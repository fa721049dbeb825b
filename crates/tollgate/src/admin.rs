// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator subcommands: inspect accounts, list packages, and drive payments
//! by hand against the configured database.

use std::sync::Arc;

use colored::Colorize;
use tracing::info;

use tollgate_config::TollgateConfig;
use tollgate_core::{ChannelAdapter, TollgateError, UserId, format_cents};
use tollgate_dispatch::messages::format_minor;
use tollgate_ledger::{AccountLedger, AdmissionPolicy, PackageCatalog};
use tollgate_payments::{DummyGateway, ReconcileOutcome, Reconciler};
use tollgate_storage::Database;
use tollgate_storage::queries::{accounts, payments, usage};

/// Storage, ledger and reconciler opened from configuration.
pub(crate) struct Engine {
    pub db: Database,
    pub ledger: Arc<AccountLedger>,
    pub reconciler: Arc<Reconciler>,
}

impl Engine {
    pub(crate) async fn open(
        config: &TollgateConfig,
        notifier: Option<Arc<dyn ChannelAdapter>>,
    ) -> Result<Self, TollgateError> {
        let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
        let ledger = Arc::new(AccountLedger::new(
            db.clone(),
            AdmissionPolicy::from_config(&config.quota),
        ));
        let gateway = Arc::new(DummyGateway::new(config.payments.success_url.clone()));
        let mut reconciler = Reconciler::from_config(ledger.clone(), &config.payments, gateway);
        if let Some(channel) = notifier {
            reconciler = reconciler.with_notifier(channel);
        }
        info!(path = %config.storage.database_path, "engine opened");
        Ok(Self {
            db,
            ledger,
            reconciler: Arc::new(reconciler),
        })
    }

    /// Drops the engine and checkpoints the database.
    pub(crate) async fn close(self) -> Result<(), TollgateError> {
        let Self {
            db,
            ledger,
            reconciler,
        } = self;
        drop(reconciler);
        drop(ledger);
        db.close().await
    }
}

pub async fn account(config: &TollgateConfig, user_id: &str) -> Result<(), TollgateError> {
    let engine = Engine::open(config, None).await?;
    let user_id = UserId::from(user_id);

    engine.ledger.apply_daily_reset(&user_id).await?;
    let summary = engine
        .ledger
        .summary(&user_id)
        .await?
        .ok_or_else(|| TollgateError::AccountNotFound(user_id.to_string()))?;
    let (requests, tokens, spent) = usage::totals_for_user(&engine.db, &user_id).await?;
    let records = payments::list_records_for_user(&engine.db, &user_id).await?;
    let open = payments::list_pending_for_user(&engine.db, &user_id).await?;

    let account = &summary.account;
    println!("{} {}", "account".bold(), account.user_id.to_string().green());
    println!("  name:           {}", account.display_name);
    println!(
        "  free today:     {}/{}",
        summary.remaining_free, summary.free_daily_limit
    );
    println!(
        "  balance:        {} ({} paid requests)",
        format_cents(account.balance_cents),
        summary.paid_requests_left
    );
    println!("  total requests: {}", account.total_requests);
    println!(
        "  usage:          {requests} requests, ~{tokens} tokens, {} spent",
        format_cents(spent)
    );

    if !records.is_empty() {
        println!("{}", "payments".bold());
        for record in &records {
            println!(
                "  {}  {}  {} via {}  +{}",
                record.created_at.dimmed(),
                record.package_id,
                format_minor(record.amount_minor, &record.currency),
                record.channel,
                format_cents(record.credited_cents)
            );
        }
    }
    if !open.is_empty() {
        println!("{}", "pending".bold());
        for payment in &open {
            println!(
                "  {}  {}  {}",
                payment.token,
                payment.package_id,
                format_minor(payment.amount_minor, &payment.currency)
            );
        }
    }

    engine.close().await
}

/// Offset of a 1-based page; page 0 is treated as page 1.
fn page_offset(limit: u32, page: u32) -> i64 {
    i64::from(limit) * i64::from(page.max(1) - 1)
}

pub async fn accounts(config: &TollgateConfig, limit: u32, page: u32) -> Result<(), TollgateError> {
    let engine = Engine::open(config, None).await?;
    let total = accounts::count(&engine.db).await?;
    let rows = engine
        .ledger
        .summaries(i64::from(limit.max(1)), page_offset(limit.max(1), page))
        .await?;

    println!(
        "{:<16} {:<16} {:>8} {:>10} {:>8} {:>10}",
        "user".bold(),
        "name".bold(),
        "today".bold(),
        "balance".bold(),
        "total".bold(),
        "spent".bold()
    );
    for summary in &rows {
        let account = &summary.account;
        let (_, _, spent) = usage::totals_for_user(&engine.db, &account.user_id).await?;
        println!(
            "{:<16} {:<16} {:>8} {:>10} {:>8} {:>10}",
            account.user_id.to_string(),
            account.display_name,
            format!("{}/{}", account.daily_used, summary.free_daily_limit),
            format_cents(account.balance_cents),
            account.total_requests,
            format_cents(spent)
        );
    }
    println!(
        "{}",
        format!("page {} ({} of {total} accounts)", page.max(1), rows.len()).dimmed()
    );

    engine.close().await
}

pub fn packages(config: &TollgateConfig) {
    let catalog = PackageCatalog::from_config(&config.payments);
    let invoice_currency = config.payments.invoice_currency.to_ascii_uppercase();
    println!(
        "{:<10} {:>9} {:>10} {:>14}",
        "package".bold(),
        "requests".bold(),
        "checkout".bold(),
        "invoice".bold()
    );
    for package in catalog.iter() {
        println!(
            "{:<10} {:>9} {:>10} {:>14}",
            package.id,
            package.requests,
            format_cents(package.checkout_price_cents),
            format_minor(package.invoice_price_minor, &invoice_currency)
        );
    }
}

pub async fn checkout(
    config: &TollgateConfig,
    user_id: &str,
    package_id: &str,
) -> Result<(), TollgateError> {
    let engine = Engine::open(config, None).await?;
    let start = engine
        .reconciler
        .start_checkout(&UserId::from(user_id), package_id)
        .await?;
    println!("session: {}", start.session_id.green());
    println!("url:     {}", start.url);
    println!(
        "package: {} ({} requests, {})",
        start.package.id,
        start.package.requests,
        format_cents(start.package.checkout_price_cents)
    );
    engine.close().await
}

pub async fn invoice(
    config: &TollgateConfig,
    user_id: &str,
    package_id: &str,
) -> Result<(), TollgateError> {
    let engine = Engine::open(config, None).await?;
    let invoice = engine
        .reconciler
        .start_invoice(&UserId::from(user_id), package_id)
        .await?;
    println!("token:   {}", invoice.token.green());
    println!("title:   {}", invoice.title);
    println!(
        "amount:  {}",
        format_minor(invoice.amount_minor, &invoice.currency)
    );
    engine.close().await
}

pub async fn reconcile(config: &TollgateConfig, token: &str) -> Result<(), TollgateError> {
    let engine = Engine::open(config, None).await?;
    match engine.reconciler.reconcile(token).await? {
        ReconcileOutcome::Credited {
            user_id,
            package_id,
            credited_cents,
            balance_cents,
        } => println!(
            "{} {} to {user_id} for package {package_id}; balance {}",
            "credited".green(),
            format_cents(credited_cents),
            format_cents(balance_cents)
        ),
        ReconcileOutcome::AlreadyCompleted { user_id } => println!(
            "{} payment for {user_id} was already credited",
            "unchanged:".yellow()
        ),
    }
    engine.close().await
}

pub async fn fail_payment(config: &TollgateConfig, token: &str) -> Result<(), TollgateError> {
    let engine = Engine::open(config, None).await?;
    let status = engine.reconciler.mark_failed(token).await?;
    println!("payment {token} is {status}");
    engine.close().await
}
