// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake notification adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Recorded notification
#[derive(Debug, Clone)]
pub struct NotifyCall {
    pub channel: String,
    pub message: String,
}

/// Fake notification adapter for testing.
///
/// Records delivered notifications and can be scripted to fail, so
/// callers can verify that delivery failures stay non-fatal.
#[derive(Clone, Default)]
pub struct FakeNotifyAdapter {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    calls: Vec<NotifyCall>,
    fail_remaining: u32,
}

impl FakeNotifyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` sends fail
    pub fn fail_times(&self, n: u32) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_remaining = n;
    }

    /// Get all delivered notifications
    pub fn calls(&self) -> Vec<NotifyCall> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.calls.clone()
    }

    /// Messages delivered to one channel
    pub fn messages_on(&self, channel: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .calls
            .iter()
            .filter(|c| c.channel == channel)
            .map(|c| c.message.clone())
            .collect()
    }
}

#[async_trait]
impl NotifyAdapter for FakeNotifyAdapter {
    async fn send(&self, channel: &str, message: &str) -> Result<(), NotifyError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.fail_remaining > 0 {
            inner.fail_remaining -= 1;
            return Err(NotifyError::SendFailed(format!(
                "scripted failure for {}",
                channel
            )));
        }
        inner.calls.push(NotifyCall {
            channel: channel.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
