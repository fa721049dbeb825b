// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` captures every delivery and invoice for assertions and can
//! be told to fail the next few deliveries.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use tollgate_core::{
    AdapterType, ChannelAdapter, HealthStatus, Invoice, OutboundMessage, PluginAdapter,
    TollgateError, UserId,
};

pub struct MockChannel {
    sent: Mutex<Vec<OutboundMessage>>,
    invoices: Mutex<Vec<(UserId, Invoice)>>,
    failures: AtomicU32,
    max_message_length: usize,
    notify: Notify,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            invoices: Mutex::new(Vec::new()),
            failures: AtomicU32::new(0),
            max_message_length: 4096,
            notify: Notify::new(),
        }
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    /// The next `n` deliveries (text or invoice) fail with a channel error.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Texts delivered to one user, in order.
    pub async fn texts_for(&self, user_id: &UserId) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| &m.user_id == user_id)
            .map(|m| m.content.clone())
            .collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn invoices(&self) -> Vec<(UserId, Invoice)> {
        self.invoices.lock().await.clone()
    }

    /// Waits until at least `count` texts have been delivered.
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.sent.lock().await.len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    fn take_failure(&self) -> Result<(), TollgateError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TollgateError::Channel {
                message: "mock delivery failure".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn deliver(&self, msg: OutboundMessage) -> Result<(), TollgateError> {
        self.take_failure()?;
        self.sent.lock().await.push(msg);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn deliver_invoice(
        &self,
        user_id: &UserId,
        invoice: &Invoice,
    ) -> Result<(), TollgateError> {
        self.take_failure()?;
        self.invoices
            .lock()
            .await
            .push((user_id.clone(), invoice.clone()));
        Ok(())
    }

    fn max_message_length(&self) -> usize {
        self.max_message_length
    }
}
