// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat completion provider.
//!
//! Sends each prompt as a single user message to `{base_url}/chat/completions`
//! and returns the first choice's text.

pub mod provider;
pub mod types;

pub use provider::OpenAiProvider;
