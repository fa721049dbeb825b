// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and health shared by every external collaborator.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::{AdapterType, HealthStatus};

/// Common surface of the chat channel, the completion provider and the
/// checkout gateway.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// `openai 0.1.0 (provider)`, for log lines and health output.
    fn label(&self) -> String {
        format!("{} {} ({})", self.name(), self.version(), self.adapter_type())
    }

    async fn health_check(&self) -> Result<HealthStatus, TollgateError>;

    /// Releases held resources. Most adapters hold none.
    async fn shutdown(&self) -> Result<(), TollgateError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl PluginAdapter for Fixed {
        fn name(&self) -> &str {
            "stripe"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(1, 2, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::CheckoutGateway
        }
        async fn health_check(&self) -> Result<HealthStatus, TollgateError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[tokio::test]
    async fn label_names_kind_and_version() {
        assert_eq!(Fixed.label(), "stripe 1.2.0 (checkout_gateway)");
        assert!(Fixed.shutdown().await.is_ok());
    }
}
