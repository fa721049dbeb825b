// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery retries and length limiting for any [`ChannelAdapter`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use tollgate_config::model::DispatchConfig;
use tollgate_core::{
    AdapterType, ChannelAdapter, HealthStatus, Invoice, OutboundMessage, PluginAdapter,
    TollgateError, UserId,
};

use crate::messages::truncate_chars;

/// Wraps a channel so every delivery is truncated to the channel's limit and
/// retried with linear backoff (`base_delay * attempt`).
pub struct RetryingChannel<C: ?Sized> {
    inner: Arc<C>,
    attempts: u32,
    base_delay: Duration,
}

impl<C: ChannelAdapter + ?Sized> RetryingChannel<C> {
    pub fn new(inner: Arc<C>, attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(inner: Arc<C>, config: &DispatchConfig) -> Self {
        Self::new(
            inner,
            config.delivery_attempts,
            Duration::from_millis(config.delivery_retry_base_ms),
        )
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    async fn backoff(&self, attempt: u32, user_id: &UserId, error: &TollgateError) {
        let delay = self.base_delay * attempt;
        warn!(
            user_id = %user_id,
            attempt,
            max_attempts = self.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "delivery failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl<C: ChannelAdapter + ?Sized> PluginAdapter for RetryingChannel<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), TollgateError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl<C: ChannelAdapter + ?Sized> ChannelAdapter for RetryingChannel<C> {
    async fn deliver(&self, msg: OutboundMessage) -> Result<(), TollgateError> {
        let limit = self.inner.max_message_length();
        let msg = OutboundMessage {
            content: truncate_chars(&msg.content, limit),
            ..msg
        };

        let mut attempt = 1;
        loop {
            match self.inner.deliver(msg.clone()).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(user_id = %msg.user_id, attempt, "delivered after retry");
                    }
                    return Ok(());
                }
                Err(e) if attempt < self.attempts => {
                    self.backoff(attempt, &msg.user_id, &e).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn deliver_invoice(
        &self,
        user_id: &UserId,
        invoice: &Invoice,
    ) -> Result<(), TollgateError> {
        let mut attempt = 1;
        loop {
            match self.inner.deliver_invoice(user_id, invoice).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    self.backoff(attempt, user_id, &e).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn max_message_length(&self) -> usize {
        self.inner.max_message_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_test_utils::MockChannel;

    fn out(text: &str) -> OutboundMessage {
        OutboundMessage::new("u", text)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_linear_backoff() {
        let inner = Arc::new(MockChannel::new());
        inner.fail_next(2);
        let channel = RetryingChannel::new(inner.clone(), 3, Duration::from_millis(1000));

        let started = tokio::time::Instant::now();
        channel.deliver(out("hi")).await.unwrap();
        // 1000ms after the first failure, 2000ms after the second.
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
        assert_eq!(inner.sent_messages().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_last_attempt() {
        let inner = Arc::new(MockChannel::new());
        inner.fail_next(5);
        let channel = RetryingChannel::new(inner.clone(), 3, Duration::from_millis(10));
        assert!(matches!(
            channel.deliver(out("hi")).await.unwrap_err(),
            TollgateError::Channel { .. }
        ));
        assert!(inner.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn long_text_is_truncated() {
        let inner = Arc::new(MockChannel::new().with_max_message_length(10));
        let channel = RetryingChannel::new(inner.clone(), 1, Duration::ZERO);
        channel.deliver(out("abcdefghijklmnop")).await.unwrap();
        assert_eq!(inner.sent_messages().await[0].content, "abcdefg...");
    }

    #[tokio::test]
    async fn wraps_trait_objects() {
        let inner: Arc<dyn ChannelAdapter> = Arc::new(MockChannel::new());
        let channel = RetryingChannel::new(inner, 3, Duration::ZERO);
        assert_eq!(channel.name(), "mock-channel");
        assert_eq!(channel.max_message_length(), 4096);
    }
}
