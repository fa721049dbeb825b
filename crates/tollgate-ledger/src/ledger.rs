// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent account ledger.
//!
//! Wraps the storage queries with the admission rules and the per-account
//! lock. Admission for one account is strictly serialized: `admit` takes the
//! account's lock and the returned [`AdmissionTicket`] holds it until it is
//! committed or released. Credits do not take the lock; they are atomic SQL
//! increments and can only make a pending paid commit more affordable.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use tollgate_core::{Account, ChargeKind, TollgateError, UserId};
use tollgate_storage::Database;
use tollgate_storage::queries::accounts;

use crate::admission::{AdmissionPolicy, Decision};
use crate::locks::{AccountGuard, AccountLocks};

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Account state plus the figures a user-facing summary needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub account: Account,
    pub free_daily_limit: u32,
    pub remaining_free: u32,
    pub cost_cents: i64,
    /// Paid requests the current balance covers.
    pub paid_requests_left: i64,
}

/// The account ledger: persistence, locking, and admission in one place.
pub struct AccountLedger {
    db: Database,
    locks: AccountLocks,
    policy: AdmissionPolicy,
    clock: Clock,
}

impl AccountLedger {
    /// Create a ledger over `db` that dates requests in UTC.
    pub fn new(db: Database, policy: AdmissionPolicy) -> Self {
        Self {
            db,
            locks: AccountLocks::new(),
            policy,
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Replace the source of "today". Used by tests crossing day boundaries.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Returns the account, creating it on first contact.
    pub async fn get_or_create(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<Account, TollgateError> {
        accounts::get_or_create(&self.db, user_id, display_name, self.today()).await
    }

    /// Structured read with today's reset applied in memory.
    pub async fn account(&self, user_id: &UserId) -> Result<Option<Account>, TollgateError> {
        let today = self.today();
        Ok(accounts::get(&self.db, user_id).await?.map(|mut account| {
            account.apply_daily_reset(today);
            account
        }))
    }

    /// Summary for `/stats` style replies and payment notices.
    pub async fn summary(&self, user_id: &UserId) -> Result<Option<AccountSummary>, TollgateError> {
        Ok(self.account(user_id).await?.map(|account| self.summarize(account)))
    }

    pub fn summarize(&self, account: Account) -> AccountSummary {
        let cost = self.policy.per_request_cost_cents;
        AccountSummary {
            remaining_free: account.remaining_free(self.policy.free_daily_limit),
            free_daily_limit: self.policy.free_daily_limit,
            cost_cents: cost,
            paid_requests_left: if cost > 0 { account.balance_cents / cost } else { 0 },
            account,
        }
    }

    /// One page of account summaries, oldest account first, with today's
    /// reset applied to the view.
    pub async fn summaries(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AccountSummary>, TollgateError> {
        let today = self.today();
        Ok(accounts::list(&self.db, limit, offset)
            .await?
            .into_iter()
            .map(|mut account| {
                account.apply_daily_reset(today);
                self.summarize(account)
            })
            .collect())
    }

    /// Persists the daily reset if the stored day is in the past.
    pub async fn apply_daily_reset(&self, user_id: &UserId) -> Result<bool, TollgateError> {
        let reset = accounts::reset_daily_if_stale(&self.db, user_id, self.today()).await?;
        if reset {
            debug!(user_id = %user_id, "daily quota reset");
        }
        Ok(reset)
    }

    /// Adds `amount` cents to the user's balance.
    pub async fn credit(&self, user_id: &UserId, amount: i64) -> Result<Account, TollgateError> {
        let account = accounts::credit(&self.db, user_id, amount).await?;
        info!(
            user_id = %user_id,
            amount_cents = amount,
            balance_cents = account.balance_cents,
            "balance credited"
        );
        Ok(account)
    }

    /// Removes `amount` cents from the user's balance, never below zero.
    ///
    /// Serialized with admission so it cannot slip between a paid decision
    /// and its commit.
    pub async fn debit(&self, user_id: &UserId, amount: i64) -> Result<Account, TollgateError> {
        let _guard = self.locks.acquire(user_id).await;
        let account = accounts::debit(&self.db, user_id, amount).await?;
        info!(
            user_id = %user_id,
            amount_cents = amount,
            balance_cents = account.balance_cents,
            "balance debited"
        );
        Ok(account)
    }

    /// Locks the account, loads it, and decides the next request.
    ///
    /// The lock stays held by the returned ticket until `commit` or
    /// `release`; a second `admit` for the same user waits until then.
    pub async fn admit(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<AdmissionTicket<'_>, TollgateError> {
        let guard = self.locks.acquire(user_id).await;
        let mut account = self.get_or_create(user_id, display_name).await?;
        let decision = self.policy.decide(&mut account, self.today());
        debug!(
            user_id = %user_id,
            daily_used = account.daily_used,
            balance_cents = account.balance_cents,
            decision = ?decision,
            "admission decided"
        );
        Ok(AdmissionTicket {
            ledger: self,
            _guard: guard,
            account,
            decision,
        })
    }
}

/// An admission decision holding its account's lock.
pub struct AdmissionTicket<'a> {
    ledger: &'a AccountLedger,
    _guard: AccountGuard,
    account: Account,
    decision: Decision,
}

impl AdmissionTicket<'_> {
    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    /// The account as seen at decision time (daily reset applied).
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Charge kind if admitted.
    pub fn charge_kind(&self) -> Option<ChargeKind> {
        match self.decision {
            Decision::Admitted(kind) => Some(kind),
            Decision::Rejected(_) => None,
        }
    }

    /// Persists the admitted request and releases the lock.
    ///
    /// Returns the account as stored afterwards.
    pub async fn commit(self) -> Result<Account, TollgateError> {
        let Decision::Admitted(kind) = self.decision else {
            return Err(TollgateError::Internal(
                "cannot commit a rejected request".into(),
            ));
        };
        let policy = self.ledger.policy;
        let mut next = self.account.clone();
        policy.commit(&mut next, kind)?;

        let stored = accounts::record_admission(
            &self.ledger.db,
            &next.user_id,
            next.daily_used,
            next.daily_reset_date,
            policy.cost_of(kind),
        )
        .await
        .inspect_err(|e| warn!(user_id = %next.user_id, error = %e, "admission commit failed"))?;

        debug!(
            user_id = %stored.user_id,
            charge = %kind,
            daily_used = stored.daily_used,
            balance_cents = stored.balance_cents,
            "admission committed"
        );
        Ok(stored)
    }

    /// Drops the lock without charging anything.
    pub fn release(self) {
        debug!(user_id = %self.account.user_id, "admission released without charge");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{RejectReason, Rejection};
    use std::time::Duration;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn ledger_on(today: &'static str) -> AccountLedger {
        let db = Database::open_in_memory().await.unwrap();
        AccountLedger::new(db, AdmissionPolicy::new(10, 10)).with_clock(move || day(today))
    }

    async fn send(ledger: &AccountLedger, user: &UserId) -> Decision {
        let ticket = ledger.admit(user, "User").await.unwrap();
        let decision = ticket.decision().clone();
        if decision.is_admitted() {
            ticket.commit().await.unwrap();
        } else {
            ticket.release();
        }
        decision
    }

    #[tokio::test]
    async fn summaries_page_through_accounts() {
        let ledger = ledger_on("2026-07-01").await;
        let a = UserId::from("a");
        let b = UserId::from("b");
        for _ in 0..3 {
            send(&ledger, &a).await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        ledger.get_or_create(&b, "Bee").await.unwrap();
        ledger.credit(&b, 25).await.unwrap();

        let page = ledger.summaries(10, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].account.user_id, a);
        assert_eq!(page[0].remaining_free, 7);
        assert_eq!(page[1].account.user_id, b);
        assert_eq!(page[1].paid_requests_left, 2);

        let second = ledger.summaries(1, 1).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].account.user_id, b);
    }

    #[tokio::test]
    async fn new_user_gets_ten_free_requests() {
        let ledger = ledger_on("2026-07-01").await;
        let uid = UserId::from("42");
        for _ in 0..10 {
            assert_eq!(send(&ledger, &uid).await, Decision::Admitted(ChargeKind::Free));
        }
        let account = ledger.account(&uid).await.unwrap().unwrap();
        assert_eq!(account.daily_used, 10);
        assert_eq!(account.balance_cents, 0);
        assert_eq!(account.total_requests, 10);

        assert!(matches!(
            send(&ledger, &uid).await,
            Decision::Rejected(Rejection {
                reason: RejectReason::QuotaExhausted,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn balance_of_seventy_allows_seven_paid() {
        let ledger = ledger_on("2026-07-01").await;
        let uid = UserId::from("42");
        for _ in 0..10 {
            send(&ledger, &uid).await;
        }
        ledger.credit(&uid, 70).await.unwrap();

        for _ in 0..7 {
            assert_eq!(send(&ledger, &uid).await, Decision::Admitted(ChargeKind::Paid));
        }
        assert!(matches!(
            send(&ledger, &uid).await,
            Decision::Rejected(Rejection {
                reason: RejectReason::InsufficientBalance,
                ..
            })
        ));
        let account = ledger.account(&uid).await.unwrap().unwrap();
        assert_eq!(account.balance_cents, 0);
        assert_eq!(account.total_requests, 17);
    }

    #[tokio::test]
    async fn stored_yesterday_resets_today() {
        let ledger = ledger_on("2026-07-02").await;
        let uid = UserId::from("42");
        ledger.get_or_create(&uid, "User").await.unwrap();
        accounts::record_admission(ledger.database(), &uid, 10, day("2026-07-01"), 0)
            .await
            .unwrap();

        assert_eq!(send(&ledger, &uid).await, Decision::Admitted(ChargeKind::Free));
        let stored = accounts::get(ledger.database(), &uid).await.unwrap().unwrap();
        assert_eq!(stored.daily_used, 1);
        assert_eq!(stored.daily_reset_date, day("2026-07-02"));
    }

    #[tokio::test]
    async fn apply_daily_reset_persists() {
        let ledger = ledger_on("2026-07-02").await;
        let uid = UserId::from("42");
        ledger.get_or_create(&uid, "").await.unwrap();
        accounts::record_admission(ledger.database(), &uid, 6, day("2026-07-01"), 0)
            .await
            .unwrap();

        assert!(ledger.apply_daily_reset(&uid).await.unwrap());
        assert!(!ledger.apply_daily_reset(&uid).await.unwrap());
        let stored = accounts::get(ledger.database(), &uid).await.unwrap().unwrap();
        assert_eq!(stored.daily_used, 0);
    }

    #[tokio::test]
    async fn summary_reports_remaining() {
        let ledger = ledger_on("2026-07-01").await;
        let uid = UserId::from("42");
        for _ in 0..3 {
            send(&ledger, &uid).await;
        }
        ledger.credit(&uid, 25).await.unwrap();
        let summary = ledger.summary(&uid).await.unwrap().unwrap();
        assert_eq!(summary.remaining_free, 7);
        assert_eq!(summary.paid_requests_left, 2);
        assert!(ledger.summary(&UserId::from("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ticket_holds_the_account_lock() {
        let ledger = Arc::new(ledger_on("2026-07-01").await);
        let uid = UserId::from("42");
        let ticket = ledger.admit(&uid, "User").await.unwrap();

        let l2 = ledger.clone();
        let u2 = uid.clone();
        let second = tokio::spawn(async move {
            let t = l2.admit(&u2, "User").await.unwrap();
            t.commit().await.unwrap()
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!second.is_finished());

        let first = ticket.commit().await.unwrap();
        assert_eq!(first.daily_used, 1);
        let after = second.await.unwrap();
        assert_eq!(after.daily_used, 2);
    }

    #[tokio::test]
    async fn credit_during_paid_admission_is_kept() {
        let ledger = ledger_on("2026-07-01").await;
        let uid = UserId::from("42");
        for _ in 0..10 {
            send(&ledger, &uid).await;
        }
        ledger.credit(&uid, 10).await.unwrap();

        let ticket = ledger.admit(&uid, "User").await.unwrap();
        assert_eq!(ticket.charge_kind(), Some(ChargeKind::Paid));
        // Lands between decide and commit.
        ledger.credit(&uid, 100).await.unwrap();
        let stored = ticket.commit().await.unwrap();
        assert_eq!(stored.balance_cents, 100);
    }

    #[tokio::test]
    async fn rejected_ticket_cannot_commit() {
        let ledger = AccountLedger::new(
            Database::open_in_memory().await.unwrap(),
            AdmissionPolicy::new(0, 10),
        );
        let ticket = ledger.admit(&UserId::from("1"), "").await.unwrap();
        assert!(ticket.charge_kind().is_none());
        assert!(matches!(
            ticket.commit().await.unwrap_err(),
            TollgateError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn concurrent_admissions_never_overspend() {
        let ledger = Arc::new(ledger_on("2026-07-01").await);
        let uid = UserId::from("42");
        ledger.get_or_create(&uid, "").await.unwrap();
        ledger.credit(&uid, 50).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let ledger = ledger.clone();
            let uid = uid.clone();
            handles.push(tokio::spawn(async move { send(&ledger, &uid).await }));
        }
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap().is_admitted() {
                admitted += 1;
            }
        }
        // 10 free + 5 paid.
        assert_eq!(admitted, 15);
        let account = ledger.account(&uid).await.unwrap().unwrap();
        assert_eq!(account.balance_cents, 0);
    }

    #[tokio::test]
    async fn debit_respects_balance() {
        let ledger = ledger_on("2026-07-01").await;
        let uid = UserId::from("42");
        ledger.get_or_create(&uid, "").await.unwrap();
        ledger.credit(&uid, 30).await.unwrap();
        assert_eq!(ledger.debit(&uid, 30).await.unwrap().balance_cents, 0);
        assert!(matches!(
            ledger.debit(&uid, 1).await.unwrap_err(),
            TollgateError::InsufficientBalance { .. }
        ));
        assert!(matches!(
            ledger.credit(&uid, -1).await.unwrap_err(),
            TollgateError::InvalidAmount { .. }
        ));
    }
}
