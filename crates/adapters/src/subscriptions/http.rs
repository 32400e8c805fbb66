// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for a remote subscription service.

use super::{SubscriptionAdapter, SubscriptionError};
use adv_core::{PackageLimits, Subscription, UserId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Subscription adapter backed by a REST service.
///
/// Two endpoints are consulted:
///
/// - `GET {base}/users/{user_id}/subscription` returns the active
///   subscription document, or 404 when the user has none.
/// - `GET {base}/packages/{package_id}` returns the package limits, or
///   404 for a package the service does not know.
#[derive(Clone)]
pub struct HttpSubscriptionClient {
    base_url: String,
}

impl HttpSubscriptionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionDoc {
    package_id: String,
}

#[derive(Debug, Deserialize)]
struct PackageDoc {
    weekly_limit: Decimal,
    repay_rate: Decimal,
    advance_percentage: Decimal,
}

/// Blocking GET, distinguishing 404 from transport failure.
fn fetch_body(url: &str) -> Result<Option<String>, SubscriptionError> {
    match ureq::get(url).call() {
        Ok(mut response) => {
            let body = response.body_mut().read_to_string().map_err(|e| {
                SubscriptionError::Unavailable(format!("failed to read response: {}", e))
            })?;
            Ok(Some(body))
        }
        Err(ureq::Error::StatusCode(404)) => Ok(None),
        Err(e) => Err(SubscriptionError::Unavailable(e.to_string())),
    }
}

/// Run the blocking fetch off the async workers.
async fn fetch(url: String) -> Result<Option<String>, SubscriptionError> {
    tokio::task::spawn_blocking(move || fetch_body(&url))
        .await
        .map_err(|e| SubscriptionError::Unavailable(format!("fetch task failed: {}", e)))?
}

#[async_trait]
impl SubscriptionAdapter for HttpSubscriptionClient {
    async fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        let url = format!("{}/users/{}/subscription", self.base_url, user_id);
        let body = match fetch(url).await? {
            Some(body) => body,
            None => return Ok(None),
        };
        let doc: SubscriptionDoc = serde_json::from_str(&body)
            .map_err(|e| SubscriptionError::Malformed(format!("subscription response: {}", e)))?;
        Ok(Some(Subscription {
            user_id: user_id.clone(),
            package_id: doc.package_id,
        }))
    }

    async fn package_limits(&self, package_id: &str) -> Result<PackageLimits, SubscriptionError> {
        let url = format!("{}/packages/{}", self.base_url, package_id);
        let body = match fetch(url).await? {
            Some(body) => body,
            None => return Err(SubscriptionError::UnknownPackage(package_id.to_string())),
        };
        let doc: PackageDoc = serde_json::from_str(&body)
            .map_err(|e| SubscriptionError::Malformed(format!("package response: {}", e)))?;
        Ok(PackageLimits {
            weekly_limit: doc.weekly_limit,
            repay_rate: doc.repay_rate,
            advance_percentage: doc.advance_percentage,
        })
    }
}
