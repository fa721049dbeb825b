// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission rules: free quota first, then prepaid balance.
//!
//! `decide` and `commit` are pure functions over an [`Account`]. Callers that
//! persist the result must hold the account's lock from `decide` until the
//! commit is written; [`crate::AccountLedger::admit`] does that.

use chrono::NaiveDate;
use tollgate_config::model::QuotaConfig;
use tollgate_core::{Account, ChargeKind, TollgateError};

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Free quota spent and nothing was ever paid for today.
    QuotaExhausted,
    /// Paid requests were the last resort and the balance no longer covers one.
    InsufficientBalance,
}

/// A rejection with what the user needs to see to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub free_daily_limit: u32,
    pub daily_used: u32,
    pub balance_cents: i64,
    pub cost_cents: i64,
}

/// Outcome of [`AdmissionPolicy::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admitted(ChargeKind),
    Rejected(Rejection),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted(_))
    }
}

/// Quota limits applied to every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub free_daily_limit: u32,
    pub per_request_cost_cents: i64,
}

impl AdmissionPolicy {
    pub fn new(free_daily_limit: u32, per_request_cost_cents: i64) -> Self {
        Self {
            free_daily_limit,
            per_request_cost_cents,
        }
    }

    pub fn from_config(config: &QuotaConfig) -> Self {
        Self::new(config.free_daily_limit, config.per_request_cost_cents)
    }

    /// Decides how (or whether) the next request is paid for.
    ///
    /// Applies the daily reset to `account` first; nothing else is mutated.
    pub fn decide(&self, account: &mut Account, today: NaiveDate) -> Decision {
        account.apply_daily_reset(today);

        if account.daily_used < self.free_daily_limit {
            return Decision::Admitted(ChargeKind::Free);
        }
        if account.balance_cents >= self.per_request_cost_cents {
            return Decision::Admitted(ChargeKind::Paid);
        }

        // Beyond the free limit means today's balance was already drawn on.
        let spent_paid_today = account.daily_used > self.free_daily_limit;
        let reason = if account.balance_cents == 0 && !spent_paid_today {
            RejectReason::QuotaExhausted
        } else {
            RejectReason::InsufficientBalance
        };
        Decision::Rejected(Rejection {
            reason,
            free_daily_limit: self.free_daily_limit,
            daily_used: account.daily_used,
            balance_cents: account.balance_cents,
            cost_cents: self.per_request_cost_cents,
        })
    }

    /// Records one admitted request against `account`.
    ///
    /// A paid commit that would overdraw fails with `InsufficientBalance` and
    /// leaves the account untouched. `ChargeKind::None` changes nothing.
    pub fn commit(&self, account: &mut Account, kind: ChargeKind) -> Result<(), TollgateError> {
        match kind {
            ChargeKind::None => return Ok(()),
            ChargeKind::Paid => account.debit(self.per_request_cost_cents)?,
            ChargeKind::Free => {}
        }
        account.daily_used = account.daily_used.saturating_add(1);
        account.total_requests = account.total_requests.saturating_add(1);
        Ok(())
    }

    /// Cost in cents of a commit of `kind`.
    pub fn cost_of(&self, kind: ChargeKind) -> i64 {
        match kind {
            ChargeKind::Paid => self.per_request_cost_cents,
            ChargeKind::Free | ChargeKind::None => 0,
        }
    }
}
