// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams to the outside world: the chat platform ([`ChannelAdapter`]), the
//! completion backend ([`ProviderAdapter`]) and the hosted payment page
//! ([`CheckoutGateway`]). The engine only ever holds them as
//! `Arc<dyn ...>`, so tests swap in mocks.

pub mod adapter;
pub mod channel;
pub mod checkout;
pub mod provider;

pub use adapter::PluginAdapter;
pub use channel::ChannelAdapter;
pub use checkout::CheckoutGateway;
pub use provider::ProviderAdapter;
