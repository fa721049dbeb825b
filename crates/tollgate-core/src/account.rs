// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-user account and its in-memory ledger operations.
//!
//! These methods are the single definition of the ledger rules. The storage
//! layer persists their results; the admission controller composes them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::TollgateError;
use crate::types::UserId;

/// Per-user usage and balance state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub display_name: String,
    /// Free-quota requests consumed on `daily_reset_date`.
    pub daily_used: u32,
    /// UTC day the `daily_used` counter belongs to.
    pub daily_reset_date: NaiveDate,
    /// Prepaid balance in USD cents. Never negative.
    pub balance_cents: i64,
    /// Lifetime admitted requests.
    pub total_requests: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    /// A fresh account with zero usage and zero balance.
    pub fn new(user_id: UserId, display_name: impl Into<String>, today: NaiveDate) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            user_id,
            display_name: display_name.into(),
            daily_used: 0,
            daily_reset_date: today,
            balance_cents: 0,
            total_requests: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Zeroes the daily counter when `today` is past the recorded day.
    ///
    /// Returns whether a reset happened. Calling twice on the same day is a no-op.
    pub fn apply_daily_reset(&mut self, today: NaiveDate) -> bool {
        if self.daily_reset_date < today {
            self.daily_used = 0;
            self.daily_reset_date = today;
            true
        } else {
            false
        }
    }

    /// Free requests left today, assuming the reset has been applied.
    pub fn remaining_free(&self, free_daily_limit: u32) -> u32 {
        free_daily_limit.saturating_sub(self.daily_used)
    }

    pub fn credit(&mut self, amount: i64) -> Result<(), TollgateError> {
        if amount < 0 {
            return Err(TollgateError::InvalidAmount { amount });
        }
        self.balance_cents = self
            .balance_cents
            .checked_add(amount)
            .ok_or_else(|| TollgateError::Internal("balance overflow".into()))?;
        Ok(())
    }

    /// Subtracts `amount`, refusing to go below zero.
    pub fn debit(&mut self, amount: i64) -> Result<(), TollgateError> {
        if amount < 0 {
            return Err(TollgateError::InvalidAmount { amount });
        }
        if self.balance_cents < amount {
            return Err(TollgateError::InsufficientBalance {
                balance_cents: self.balance_cents,
                required_cents: amount,
            });
        }
        self.balance_cents -= amount;
        Ok(())
    }
}
