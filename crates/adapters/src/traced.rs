// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::notify::{NotifyAdapter, NotifyError};
use crate::subscriptions::{SubscriptionAdapter, SubscriptionError};
use adv_core::{PackageLimits, Subscription, UserId};
use async_trait::async_trait;

/// Wrapper that adds tracing to any SubscriptionAdapter
#[derive(Clone)]
pub struct TracedSubscriptionAdapter<S> {
    inner: S,
}

impl<S> TracedSubscriptionAdapter<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: SubscriptionAdapter> SubscriptionAdapter for TracedSubscriptionAdapter<S> {
    async fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        let span = tracing::info_span!("subscription.lookup", user = %user_id);
        let _guard = span.enter();

        // Precondition: a user id is required
        if user_id.0.is_empty() {
            tracing::error!("empty user id");
            return Err(SubscriptionError::Malformed("empty user id".to_string()));
        }

        let start = std::time::Instant::now();
        let result = self.inner.active_subscription(user_id).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(Some(subscription)) => tracing::info!(
                package = %subscription.package_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "subscription found"
            ),
            Ok(None) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "no active subscription"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "lookup failed"
            ),
        }

        result
    }

    async fn package_limits(&self, package_id: &str) -> Result<PackageLimits, SubscriptionError> {
        let span = tracing::info_span!("subscription.package", package = package_id);
        let _guard = span.enter();

        // Precondition: a package id is required
        if package_id.is_empty() {
            tracing::error!("empty package id");
            return Err(SubscriptionError::Malformed("empty package id".to_string()));
        }

        let start = std::time::Instant::now();
        let result = self.inner.package_limits(package_id).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(limits) => tracing::debug!(
                weekly_limit = %limits.weekly_limit,
                elapsed_ms = elapsed.as_millis() as u64,
                "limits fetched"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "package fetch failed"
            ),
        }

        result
    }
}

/// Wrapper that adds tracing to any NotifyAdapter
#[derive(Clone)]
pub struct TracedNotifyAdapter<N> {
    inner: N,
}

impl<N> TracedNotifyAdapter<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<N: NotifyAdapter> NotifyAdapter for TracedNotifyAdapter<N> {
    async fn send(&self, channel: &str, message: &str) -> Result<(), NotifyError> {
        let span = tracing::info_span!("notify.send", channel);
        let _guard = span.enter();

        tracing::debug!(message_len = message.len(), "sending");
        let result = self.inner.send(channel, message).await;

        // send() failing is acceptable (notifications are best-effort)
        match &result {
            Ok(()) => tracing::debug!("sent"),
            Err(e) => tracing::warn!(error = %e, "send failed (non-fatal)"),
        }

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
