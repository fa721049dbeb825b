// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment initiation and reconciliation.
//!
//! Two payment paths feed one ledger: hosted checkout (the gateway issues a
//! session id) and in-chat invoices (a locally generated token). Both end in
//! [`Reconciler::reconcile`], which credits a token at most once.

pub mod events;
pub mod gateway;
pub mod reconciler;

pub use events::{PaymentEvent, ReconcileOutcome};
pub use gateway::DummyGateway;
pub use reconciler::{CheckoutStart, Reconciler};
