// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for AI completion services.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for a text completion service.
///
/// Any transport failure, non-success status, malformed payload or missing
/// text must surface as [`TollgateError::Provider`]. Callers bound the call
/// with their own timeout.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends the user's text and returns the completion text.
    async fn complete(&self, prompt: &str) -> Result<String, TollgateError>;
}
