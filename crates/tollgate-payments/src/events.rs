// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment notifications from gateways and chat platforms.

use tollgate_core::UserId;

/// A payment notification, already authenticated by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// Hosted checkout finished (`checkout.session.completed`).
    CheckoutCompleted { session_id: String },
    /// Hosted checkout expired or was abandoned.
    CheckoutFailed { session_id: String },
    /// The chat platform confirmed an invoice payment.
    InvoicePaid {
        token: String,
        total_amount: i64,
        currency: String,
    },
}

impl PaymentEvent {
    /// The payment token the event refers to.
    pub fn token(&self) -> &str {
        match self {
            PaymentEvent::CheckoutCompleted { session_id }
            | PaymentEvent::CheckoutFailed { session_id } => session_id,
            PaymentEvent::InvoicePaid { token, .. } => token,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentEvent::CheckoutCompleted { .. } => "checkout_completed",
            PaymentEvent::CheckoutFailed { .. } => "checkout_failed",
            PaymentEvent::InvoicePaid { .. } => "invoice_paid",
        }
    }
}

/// Successful result of [`crate::Reconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This call completed the token and credited the account.
    Credited {
        user_id: UserId,
        package_id: String,
        credited_cents: i64,
        balance_cents: i64,
    },
    /// The token was completed earlier; nothing changed.
    AlreadyCompleted { user_id: UserId },
}

impl ReconcileOutcome {
    pub fn is_credited(&self) -> bool {
        matches!(self, ReconcileOutcome::Credited { .. })
    }
}
