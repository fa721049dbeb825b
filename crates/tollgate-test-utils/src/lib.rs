// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tollgate integration tests.
//!
//! Provides mock adapters and a harness that assembles the full engine on a
//! temporary database, so tests run without network access.
//!
//! # Components
//!
//! - [`MockProvider`] - completion provider with scripted replies, errors and latency
//! - [`MockChannel`] - channel capturing deliveries and invoices, with injectable failures
//! - [`TestHarness`] - ledger, reconciler and dispatcher wired to the mocks

pub mod harness;
pub mod mock_channel;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_channel::MockChannel;
pub use mock_provider::MockProvider;
