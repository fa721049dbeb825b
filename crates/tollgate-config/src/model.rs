// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tollgate usage engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Tollgate configuration.
///
/// All sections are optional and default to the values the bot ships with.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TollgateConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Free quota and per-request pricing.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Completion dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Completion provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Payment packages, currencies and checkout URLs.
    #[serde(default)]
    pub payments: PaymentsConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in greetings.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "tollgate".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tollgate").join("tollgate.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tollgate.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Free quota and pricing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Requests per UTC day that cost nothing.
    #[serde(default = "default_free_daily_limit")]
    pub free_daily_limit: u32,

    /// Balance debited per request once the free quota is spent, in USD cents.
    #[serde(default = "default_per_request_cost_cents")]
    pub per_request_cost_cents: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_daily_limit: default_free_daily_limit(),
            per_request_cost_cents: default_per_request_cost_cents(),
        }
    }
}

fn default_free_daily_limit() -> u32 {
    10
}

fn default_per_request_cost_cents() -> i64 {
    10
}

/// Completion dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Upper bound on a single provider call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Provider calls allowed in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Messages that may wait for a worker before new ones are turned away.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown waits for queued and in-flight requests.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Only consume quota or balance when the provider call succeeds.
    #[serde(default)]
    pub charge_only_on_success: bool,

    /// Delivery attempts per outbound message.
    #[serde(default = "default_delivery_attempts")]
    pub delivery_attempts: u32,

    /// Base delay between delivery attempts; attempt `n` waits `n` times this.
    #[serde(default = "default_delivery_retry_base_ms")]
    pub delivery_retry_base_ms: u64,

    /// Reply sent when the completion could not be produced.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            queue_capacity: default_queue_capacity(),
            drain_timeout_secs: default_drain_timeout_secs(),
            charge_only_on_success: false,
            delivery_attempts: default_delivery_attempts(),
            delivery_retry_base_ms: default_delivery_retry_base_ms(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    256
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_delivery_attempts() -> u32 {
    3
}

fn default_delivery_retry_base_ms() -> u64 {
    1000
}

fn default_fallback_reply() -> String {
    "Sorry, I could not get an answer right now. Please try again later.".to_string()
}

/// OpenAI-compatible completion provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. Without one the dispatcher answers with the fallback reply.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

/// Payment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentsConfig {
    /// Currency of hosted checkout prices.
    #[serde(default = "default_checkout_currency")]
    pub checkout_currency: String,

    /// Currency of in-chat invoice prices.
    #[serde(default = "default_invoice_currency")]
    pub invoice_currency: String,

    /// Redirect after a successful checkout. `{CHECKOUT_SESSION_ID}` is
    /// substituted by the gateway.
    #[serde(default = "default_success_url")]
    pub success_url: String,

    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,

    /// Purchasable packages.
    #[serde(default = "default_packages")]
    pub packages: Vec<PackageConfig>,

    /// Ledger cents per one major unit of each currency.
    #[serde(default = "default_rates")]
    pub rates: BTreeMap<String, f64>,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            checkout_currency: default_checkout_currency(),
            invoice_currency: default_invoice_currency(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            packages: default_packages(),
            rates: default_rates(),
        }
    }
}

/// One purchasable package.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    pub id: String,
    pub requests: u32,
    /// Price in minor units of `checkout_currency`.
    pub checkout_price_cents: i64,
    /// Price in minor units of `invoice_currency`.
    pub invoice_price_minor: i64,
}

fn default_checkout_currency() -> String {
    "USD".to_string()
}

fn default_invoice_currency() -> String {
    "RUB".to_string()
}

fn default_success_url() -> String {
    "https://example.com/success?session_id={CHECKOUT_SESSION_ID}".to_string()
}

fn default_cancel_url() -> String {
    "https://example.com/cancel".to_string()
}

fn default_packages() -> Vec<PackageConfig> {
    [("10", 10, 100, 10_000), ("50", 50, 400, 40_000), ("100", 100, 700, 70_000)]
        .into_iter()
        .map(|(id, requests, usd, rub)| PackageConfig {
            id: id.to_string(),
            requests,
            checkout_price_cents: usd,
            invoice_price_minor: rub,
        })
        .collect()
}

fn default_rates() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("USD".to_string(), 100.0),
        ("RUB".to_string(), 100.0 / 90.0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_packages_match_price_list() {
        let packages = default_packages();
        let ids: Vec<&str> = packages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["10", "50", "100"]);
        assert_eq!(packages[1].requests, 50);
        assert_eq!(packages[1].checkout_price_cents, 400);
        assert_eq!(packages[2].invoice_price_minor, 70_000);
    }

    #[test]
    fn default_rates_cover_both_currencies() {
        let config = PaymentsConfig::default();
        assert!(config.rates.contains_key(&config.checkout_currency));
        assert!(config.rates.contains_key(&config.invoice_currency));
        assert!((config.rates["RUB"] - 1.111_111_111_111_111).abs() < 1e-10);
    }

    #[test]
    fn dispatch_defaults_charge_on_admit() {
        let dispatch = DispatchConfig::default();
        assert!(!dispatch.charge_only_on_success);
        assert_eq!(dispatch.delivery_attempts, 3);
    }
}
