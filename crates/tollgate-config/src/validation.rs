// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: positive prices,
//! non-empty package tables, currencies that have a published rate.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::TollgateConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &TollgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        fail(format!(
            "agent.log_level `{}` must be one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.quota.per_request_cost_cents <= 0 {
        fail(format!(
            "quota.per_request_cost_cents must be positive, got {}",
            config.quota.per_request_cost_cents
        ));
    }

    let dispatch = &config.dispatch;
    if dispatch.timeout_secs == 0 {
        fail("dispatch.timeout_secs must be at least 1".to_string());
    }
    if dispatch.max_concurrency == 0 {
        fail("dispatch.max_concurrency must be at least 1".to_string());
    }
    if dispatch.queue_capacity == 0 {
        fail("dispatch.queue_capacity must be at least 1".to_string());
    }
    if dispatch.delivery_attempts == 0 {
        fail("dispatch.delivery_attempts must be at least 1".to_string());
    }

    let provider = &config.provider;
    if !(0.0..=2.0).contains(&provider.temperature) {
        fail(format!(
            "provider.temperature must be between 0 and 2, got {}",
            provider.temperature
        ));
    }
    if provider.max_tokens == 0 {
        fail("provider.max_tokens must be at least 1".to_string());
    }

    let payments = &config.payments;
    if payments.packages.is_empty() {
        fail("payments.packages must define at least one package".to_string());
    }

    let mut seen_ids = HashSet::new();
    for (i, package) in payments.packages.iter().enumerate() {
        if package.id.trim().is_empty() {
            fail(format!("payments.packages[{i}].id must not be empty"));
        } else if !seen_ids.insert(package.id.as_str()) {
            fail(format!(
                "duplicate package id `{}` in [[payments.packages]]",
                package.id
            ));
        }
        if package.requests == 0 {
            fail(format!("payments.packages[{i}].requests must be at least 1"));
        }
        if package.checkout_price_cents <= 0 || package.invoice_price_minor <= 0 {
            fail(format!("payments.packages[{i}] prices must be positive"));
        }
    }

    // Currency codes are matched case-insensitively at runtime.
    let mut rate_codes = HashSet::new();
    for (currency, rate) in &payments.rates {
        if !rate.is_finite() || *rate <= 0.0 {
            fail(format!(
                "payments.rates.{currency} must be a positive number, got {rate}"
            ));
        }
        if !rate_codes.insert(currency.to_ascii_uppercase()) {
            fail(format!(
                "payments.rates.{currency} duplicates another rate with different case"
            ));
        }
    }

    for (key, currency) in [
        ("checkout_currency", &payments.checkout_currency),
        ("invoice_currency", &payments.invoice_currency),
    ] {
        if !rate_codes.contains(&currency.to_ascii_uppercase()) {
            fail(format!(
                "payments.{key} `{currency}` has no entry in [payments.rates]"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
