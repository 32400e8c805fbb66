// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external services: subscription lookups and notifications

pub mod notify;
pub mod subscriptions;
pub mod traced;

pub use notify::{NoOpNotifyAdapter, NotifyAdapter, WebhookNotifier};
pub use subscriptions::{FixedSubscriptions, HttpSubscriptionClient, SubscriptionAdapter};
pub use traced::{TracedNotifyAdapter, TracedSubscriptionAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
