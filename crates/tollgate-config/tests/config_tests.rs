// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tollgate configuration system.

use tollgate_config::diagnostic::ConfigError;
use tollgate_config::{load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[agent]
name = "quota-bot"
log_level = "debug"

[storage]
database_path = "/tmp/tollgate-test.db"
wal_mode = false

[quota]
free_daily_limit = 5
per_request_cost_cents = 25

[dispatch]
timeout_secs = 15
max_concurrency = 2
charge_only_on_success = true

[provider]
api_key = "sk-123"
model = "gpt-4o-mini"

[payments]
invoice_currency = "USD"

[[payments.packages]]
id = "starter"
requests = 20
checkout_price_cents = 300
invoice_price_minor = 300
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "quota-bot");
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/tollgate-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.quota.free_daily_limit, 5);
    assert_eq!(config.quota.per_request_cost_cents, 25);
    assert_eq!(config.dispatch.timeout_secs, 15);
    assert_eq!(config.dispatch.max_concurrency, 2);
    assert!(config.dispatch.charge_only_on_success);
    assert_eq!(config.provider.api_key.as_deref(), Some("sk-123"));
    assert_eq!(config.provider.model, "gpt-4o-mini");
    assert_eq!(config.payments.invoice_currency, "USD");
    // An explicit package table replaces the built-in one.
    assert_eq!(config.payments.packages.len(), 1);
    assert_eq!(config.payments.packages[0].id, "starter");
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.agent.name, "tollgate");
    assert_eq!(config.agent.log_level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.quota.free_daily_limit, 10);
    assert_eq!(config.quota.per_request_cost_cents, 10);
    assert_eq!(config.dispatch.timeout_secs, 60);
    assert!(!config.dispatch.charge_only_on_success);
    assert!(config.provider.api_key.is_none());
    assert_eq!(config.provider.max_tokens, 1000);
    assert_eq!(config.payments.checkout_currency, "USD");
    assert_eq!(config.payments.invoice_currency, "RUB");
    assert_eq!(config.payments.packages.len(), 3);
}

#[test]
fn unknown_field_in_quota_produces_error() {
    let toml = r#"
[quota]
free_daly_limit = 3
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("free_daly_limit"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_key_diagnostic_suggests_correction() {
    let toml = r#"
[quota]
free_daly_limit = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { suggestion, .. } => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("free_daily_limit"));
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[dispatch]
timeout_secs = "soon"
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_))),
        "got: {errors:?}"
    );
}

#[test]
fn semantic_errors_come_back_from_validation() {
    let toml = r#"
[quota]
per_request_cost_cents = -1
"#;

    let errors = load_and_validate_str(toml).expect_err("negative cost must fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { message } if message.contains("per_request_cost_cents")
    )));
}
