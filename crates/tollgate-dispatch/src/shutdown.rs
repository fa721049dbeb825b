// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SIGINT/SIGTERM handling. The binary cancels intake on the first signal
//! and drains the dispatcher before closing the database.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Which signal asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Resolves on the first SIGINT or SIGTERM. Without a SIGTERM stream
/// (non-unix, or registration failed) only Ctrl+C is watched.
pub async fn wait_for_signal() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                return tokio::select! {
                    _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt,
                    _ = term.recv() => ShutdownSignal::Terminate,
                };
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable, watching Ctrl+C only"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}

/// Spawns a watcher and returns a token it cancels on the first signal.
/// Cancelling the token yourself stops the watcher.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_signal() => {
                info!(%signal, "shutdown requested, draining dispatcher");
                watcher.cancel();
            }
            _ = watcher.cancelled() => {}
        }
    });

    token
}
