// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package catalog and currency normalization.
//!
//! Default prices:
//!
//! | package | requests | checkout | invoice |
//! |---------|----------|----------|---------|
//! | `10`    | 10       | $1.00    | 100 RUB |
//! | `50`    | 50       | $4.00    | 400 RUB |
//! | `100`   | 100      | $7.00    | 700 RUB |
//!
//! Rates are ledger cents per one major currency unit (`USD = 100`,
//! `RUB = 100 / 90`). Every currency here has 100 minor units.

use std::collections::BTreeMap;

use tollgate_config::model::PaymentsConfig;
use tollgate_core::{Package, TollgateError};

/// The purchasable packages, in display order.
#[derive(Debug, Clone)]
pub struct PackageCatalog {
    packages: Vec<Package>,
}

impl PackageCatalog {
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    pub fn from_config(config: &PaymentsConfig) -> Self {
        Self::new(
            config
                .packages
                .iter()
                .map(|p| Package {
                    id: p.id.clone(),
                    requests: p.requests,
                    checkout_price_cents: p.checkout_price_cents,
                    invoice_price_minor: p.invoice_price_minor,
                })
                .collect(),
        )
    }

    /// Looks up a package by id.
    pub fn get(&self, id: &str) -> Result<&Package, TollgateError> {
        self.packages
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| TollgateError::UnknownPackage(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::from_config(&PaymentsConfig::default())
    }
}

/// Balance credited for a package: its request count at the per-request cost.
///
/// Buying N requests always funds exactly N paid requests, whatever the
/// package discount.
pub fn request_equivalent_cents(package: &Package, per_request_cost_cents: i64) -> i64 {
    i64::from(package.requests).saturating_mul(per_request_cost_cents)
}

/// Fixed conversion rates into ledger cents.
#[derive(Debug, Clone)]
pub struct RateTable {
    cents_per_major: BTreeMap<String, f64>,
}

impl RateTable {
    pub fn new(cents_per_major: BTreeMap<String, f64>) -> Self {
        Self {
            cents_per_major: cents_per_major
                .into_iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v))
                .collect(),
        }
    }

    pub fn from_config(config: &PaymentsConfig) -> Self {
        Self::new(config.rates.clone())
    }

    /// Converts `amount_minor` of `currency` into ledger cents, rounded to
    /// the nearest cent.
    pub fn normalize(&self, amount_minor: i64, currency: &str) -> Result<i64, TollgateError> {
        let rate = self
            .cents_per_major
            .get(&currency.to_ascii_uppercase())
            .ok_or_else(|| TollgateError::UnknownCurrency(currency.to_string()))?;
        Ok((amount_minor as f64 / 100.0 * rate).round() as i64)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::from_config(&PaymentsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_lookup() {
        let catalog = PackageCatalog::default();
        let p = catalog.get("50").unwrap();
        assert_eq!(p.requests, 50);
        assert_eq!(p.checkout_price_cents, 400);
        assert_eq!(catalog.iter().count(), 3);
    }

    #[test]
    fn unknown_package() {
        let catalog = PackageCatalog::default();
        let err = catalog.get("25").unwrap_err();
        assert!(matches!(err, TollgateError::UnknownPackage(id) if id == "25"));
    }

    #[test]
    fn credit_is_request_equivalent() {
        let catalog = PackageCatalog::default();
        assert_eq!(request_equivalent_cents(catalog.get("10").unwrap(), 10), 100);
        // Discounted package still funds every request it names.
        assert_eq!(request_equivalent_cents(catalog.get("100").unwrap(), 10), 1000);
    }

    #[test]
    fn usd_is_identity() {
        let rates = RateTable::default();
        assert_eq!(rates.normalize(700, "USD").unwrap(), 700);
        assert_eq!(rates.normalize(700, "usd").unwrap(), 700);
    }

    #[test]
    fn rub_converts_at_ninety() {
        let rates = RateTable::default();
        // 400 RUB / 90 = 4.444 USD
        assert_eq!(rates.normalize(40_000, "RUB").unwrap(), 444);
        assert_eq!(rates.normalize(9_000, "RUB").unwrap(), 100);
    }

    #[test]
    fn unknown_currency() {
        let rates = RateTable::default();
        assert!(matches!(
            rates.normalize(100, "EUR").unwrap_err(),
            TollgateError::UnknownCurrency(c) if c == "EUR"
        ));
    }
}
