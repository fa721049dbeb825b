// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account ledger and admission control for the Tollgate usage engine.
//!
//! This crate provides:
//! - **Admission**: the pure decide/commit rules for the daily free quota
//!   and the prepaid balance
//! - **Ledger**: persistent accounts with per-account serialization of
//!   admission and atomic credits
//! - **Pricing**: the package catalog and the currency rate table

pub mod admission;
pub mod ledger;
pub mod locks;
pub mod pricing;

pub use admission::{AdmissionPolicy, Decision, RejectReason, Rejection};
pub use ledger::{AccountLedger, AccountSummary, AdmissionTicket};
pub use locks::{AccountGuard, AccountLocks};
pub use pricing::{PackageCatalog, RateTable};
