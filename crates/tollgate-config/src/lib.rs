// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Tollgate usage engine.
//!
//! `tollgate.toml` holds the quota policy, the package catalog and currency
//! rates, dispatch limits and the provider endpoint. Unknown keys are
//! rejected, `TOLLGATE_*` variables override file values, and load failures
//! come back as miette diagnostics that point into the offending file.
//!
//! ```no_run
//! use tollgate_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Free requests per day: {}", config.quota.free_daily_limit);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::TollgateConfig;

/// Load from the standard lookup hierarchy and validate.
pub fn load_and_validate() -> Result<TollgateConfig, Vec<ConfigError>> {
    finish(loader::load_config(), hierarchy_sources)
}

/// Load from an explicit file (plus env overrides) and validate.
pub fn load_and_validate_path(path: &Path) -> Result<TollgateConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_sources([path.to_path_buf()])
    })
}

/// Load from a TOML string and validate.
pub fn load_and_validate_str(toml_content: &str) -> Result<TollgateConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Runs validation on a loaded config, or turns a figment failure into
/// diagnostics. Source files are only read when there is an error to place.
fn finish(
    loaded: Result<TollgateConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<TollgateConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Every file the hierarchy lookup may have read.
fn hierarchy_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|d| d.join("tollgate.toml"))
        .unwrap_or_else(|_| PathBuf::from("tollgate.toml"));
    let user = dirs::config_dir().map(|d| d.join("tollgate/tollgate.toml"));
    let system = PathBuf::from("/etc/tollgate/tollgate.toml");

    read_sources(std::iter::once(local).chain(user).chain(std::iter::once(system)))
}

/// `(display path, content)` for each path that exists and is readable.
fn read_sources(paths: impl IntoIterator<Item = PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
