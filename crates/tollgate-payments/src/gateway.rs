// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline checkout gateway.
//!
//! Issues session ids and redirect URLs without talking to any payment
//! service. Completion must be reported separately (e.g. `tollgate reconcile`).

use async_trait::async_trait;
use tracing::info;

use tollgate_core::{
    AdapterType, CheckoutGateway, CheckoutRequest, CheckoutSession, HealthStatus, PluginAdapter,
    TollgateError,
};

/// Placeholder in success URLs replaced with the session id.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Checkout gateway that creates sessions locally.
pub struct DummyGateway {
    success_url: String,
}

impl DummyGateway {
    pub fn new(success_url: impl Into<String>) -> Self {
        Self {
            success_url: success_url.into(),
        }
    }
}

#[async_trait]
impl PluginAdapter for DummyGateway {
    fn name(&self) -> &str {
        "dummy-checkout"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CheckoutGateway
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl CheckoutGateway for DummyGateway {
    async fn create_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, TollgateError> {
        let session_id = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
        let url = self.success_url.replace(SESSION_ID_PLACEHOLDER, &session_id);
        info!(
            session_id = %session_id,
            user_id = %request.user_id,
            package = %request.package.id,
            amount_minor = request.amount_minor,
            currency = %request.currency,
            "dummy checkout session created"
        );
        Ok(CheckoutSession { session_id, url })
    }
}
