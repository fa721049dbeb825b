// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of a chat platform integration.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Invoice, OutboundMessage, UserId};

/// Delivers text (and invoices) to chat users.
///
/// Inbound messages are pushed into the dispatcher by the transport, so the
/// channel only needs the delivery half.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Sends a text message to a user.
    async fn deliver(&self, msg: OutboundMessage) -> Result<(), TollgateError>;

    /// Sends an in-chat invoice. Channels without native invoices get a
    /// plain-text rendering carrying the payment token.
    async fn deliver_invoice(
        &self,
        user_id: &UserId,
        invoice: &Invoice,
    ) -> Result<(), TollgateError> {
        let text = format!(
            "{}\n{}\nAmount: {:.2} {}\nPayment reference: {}",
            invoice.title,
            invoice.description,
            invoice.amount_minor as f64 / 100.0,
            invoice.currency,
            invoice.token
        );
        self.deliver(OutboundMessage::new(user_id.clone(), text)).await
    }

    /// Longest text the platform accepts in one message.
    fn max_message_length(&self) -> usize {
        4096
    }
}

