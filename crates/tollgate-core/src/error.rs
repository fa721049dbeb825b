// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tollgate usage engine.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Tollgate adapter traits and core operations.
#[derive(Debug, Error)]
pub enum TollgateError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (delivery failure, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Completion provider errors (transport failure, non-success status, malformed payload).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The completion provider did not answer within the configured bound.
    #[error("provider timed out after {duration:?}")]
    ProviderTimeout { duration: Duration },

    /// Credit or debit requested with a negative amount.
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: i64 },

    /// A debit would take the balance below zero.
    #[error("insufficient balance: have {balance_cents} cents, need {required_cents}")]
    InsufficientBalance {
        balance_cents: i64,
        required_cents: i64,
    },

    /// Package id is not in the catalog.
    #[error("unknown package: {0}")]
    UnknownPackage(String),

    /// Payment token has no pending payment row.
    #[error("unknown payment token: {0}")]
    UnknownPaymentToken(String),

    /// Payment token exists but can no longer be completed.
    #[error("payment {token} is {status}, not pending")]
    PaymentNotPending { token: String, status: String },

    /// Currency has no entry in the rate table.
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    /// No account exists for the user.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TollgateError {
    /// Wraps any storage-layer error.
    pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        TollgateError::Storage {
            source: Box::new(e),
        }
    }

    /// Whether the error is a rejection the caller can show to the user
    /// verbatim, as opposed to an infrastructure failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TollgateError::InvalidAmount { .. }
                | TollgateError::InsufficientBalance { .. }
                | TollgateError::UnknownPackage(_)
                | TollgateError::UnknownPaymentToken(_)
                | TollgateError::PaymentNotPending { .. }
        )
    }
}
