// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tollgate usage engine.
//!
//! This crate provides the error type, the account model with its ledger
//! rules, common message and payment types, and the adapter traits the
//! engine talks to the outside world through.

pub mod account;
pub mod error;
pub mod traits;
pub mod types;

pub use account::Account;
pub use error::TollgateError;
pub use types::{
    AdapterType, ChargeKind, CheckoutRequest, CheckoutSession, HealthStatus, InboundMessage,
    Invoice, OutboundMessage, Package, PaymentChannel, PaymentStatus, UsageOutcome, UserId,
    format_cents,
};

pub use traits::{ChannelAdapter, CheckoutGateway, PluginAdapter, ProviderAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tollgate_error_messages() {
        let err = TollgateError::InsufficientBalance {
            balance_cents: 5,
            required_cents: 10,
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance: have 5 cents, need 10"
        );
        assert!(err.is_user_facing());

        let storage = TollgateError::storage(std::io::Error::other("disk"));
        assert!(storage.to_string().contains("disk"));
        assert!(!storage.is_user_facing());

        let timeout = TollgateError::ProviderTimeout {
            duration: std::time::Duration::from_secs(30),
        };
        assert_eq!(timeout.to_string(), "provider timed out after 30s");
    }

    #[test]
    fn adapter_type_round_trip() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Channel,
            AdapterType::Provider,
            AdapterType::CheckoutGateway,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        assert_ne!(HealthStatus::Degraded("slow".into()), healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), healthy);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_channel_adapter<T: ChannelAdapter>() {}
        fn _assert_provider_adapter<T: ProviderAdapter>() {}
        fn _assert_checkout_gateway<T: CheckoutGateway>() {}
    }
}
