// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory subscription table for static deployments.

use super::{SubscriptionAdapter, SubscriptionError};
use adv_core::{PackageLimits, Subscription, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Subscription adapter backed by a fixed in-memory table.
///
/// Used when no subscription service is configured: packages and
/// subscribers come from the daemon config (or from test setup) and can
/// be changed at runtime through the mutating methods.
#[derive(Clone, Default)]
pub struct FixedSubscriptions {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    subscriptions: HashMap<UserId, Subscription>,
    packages: HashMap<String, PackageLimits>,
}

impl FixedSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package and its limits
    pub fn define_package(&self, package_id: impl Into<String>, limits: PackageLimits) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.packages.insert(package_id.into(), limits);
    }

    /// Subscribe a user to a package
    pub fn subscribe(&self, user_id: UserId, package_id: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let subscription = Subscription {
            user_id: user_id.clone(),
            package_id: package_id.into(),
        };
        inner.subscriptions.insert(user_id, subscription);
    }

    /// Drop a user's subscription
    pub fn unsubscribe(&self, user_id: &UserId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscriptions.remove(user_id);
    }
}

#[async_trait]
impl SubscriptionAdapter for FixedSubscriptions {
    async fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.subscriptions.get(user_id).cloned())
    }

    async fn package_limits(&self, package_id: &str) -> Result<PackageLimits, SubscriptionError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .packages
            .get(package_id)
            .cloned()
            .ok_or_else(|| SubscriptionError::UnknownPackage(package_id.to_string()))
    }
}

#[cfg(test)]
#[path = "fixed_tests.rs"]
mod tests;
