// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the payment and usage tables.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tollgate_core::{ChargeKind, PaymentChannel, PaymentStatus, UsageOutcome, UserId};

/// A payment token issued to a user and awaiting (or past) completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub token: String,
    pub user_id: UserId,
    pub package_id: String,
    pub channel: PaymentChannel,
    /// Price in minor units of `currency`.
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A completed payment, written in the same transaction as the credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub token: String,
    pub user_id: UserId,
    pub package_id: String,
    pub channel: PaymentChannel,
    pub amount_minor: i64,
    pub currency: String,
    /// The paid amount converted to ledger cents with the rate table.
    pub normalized_cents: i64,
    /// What the balance actually grew by.
    pub credited_cents: i64,
    pub created_at: String,
}

/// One dispatched completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub user_id: UserId,
    pub request_text: String,
    pub response_text: String,
    pub approx_tokens: i64,
    pub charge_kind: ChargeKind,
    pub cost_cents: i64,
    pub outcome: UsageOutcome,
    pub created_at: String,
}

/// Parses a TEXT column into a strum enum, reporting the column on failure.
pub(crate) fn parse_text<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
