// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription service adapters

mod fixed;
mod http;

pub use fixed::FixedSubscriptions;
pub use http::HttpSubscriptionClient;

use adv_core::{PackageLimits, Subscription, UserId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from subscription lookups
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription service unavailable: {0}")]
    Unavailable(String),
    #[error("unknown package: {0}")]
    UnknownPackage(String),
    #[error("malformed subscription data: {0}")]
    Malformed(String),
}

/// Adapter for the subscription service.
///
/// The engine asks two questions: does this user currently have an active
/// subscription, and what limits does their package carry. A user without
/// an active subscription gets `Ok(None)`, not an error; `Unavailable` is
/// reserved for transport failures and is safe to retry.
#[async_trait]
pub trait SubscriptionAdapter: Clone + Send + Sync + 'static {
    /// Look up the user's active subscription, if any
    async fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError>;

    /// Fetch the limits attached to a package
    async fn package_limits(&self, package_id: &str) -> Result<PackageLimits, SubscriptionError>;
}
