// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hosted checkout gateway abstraction.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CheckoutRequest, CheckoutSession};

/// A payment gateway that hosts the checkout page and later reports
/// completion by session id.
#[async_trait]
pub trait CheckoutGateway: PluginAdapter {
    /// Creates a checkout session for one package purchase.
    ///
    /// The returned `session_id` is the payment token the completion event
    /// will carry.
    async fn create_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, TollgateError>;
}
