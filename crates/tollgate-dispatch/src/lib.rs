// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion dispatch for the Tollgate usage engine.
//!
//! Inbound chat text is admitted against the ledger, sent to the completion
//! provider off the receive path, charged, recorded, and answered. Slash
//! commands are answered inline by the [`commands`] router.

pub mod commands;
pub mod dispatcher;
pub mod job;
pub mod messages;
pub mod retry;
pub mod shutdown;

pub use commands::{Command, CommandRouter};
pub use dispatcher::{DispatchSettings, DispatchStats, Dispatcher, DrainReport};
pub use job::JobState;
pub use retry::RetryingChannel;
pub use shutdown::{ShutdownSignal, install_signal_handler, wait_for_signal};
