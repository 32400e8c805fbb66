// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification adapters

mod noop;
mod webhook;

pub use noop::NoOpNotifyAdapter;
pub use webhook::WebhookNotifier;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from notification delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification failed: {0}")]
    SendFailed(String),
}

/// Adapter for outbound notifications.
///
/// Callers treat delivery as best-effort: a failed send is logged and
/// never fails the operation that triggered it.
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    /// Send a notification to a channel
    async fn send(&self, channel: &str, message: &str) -> Result<(), NotifyError>;
}
