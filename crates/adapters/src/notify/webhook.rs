// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook notification adapter

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;

/// Notification adapter that POSTs JSON to a webhook URL.
///
/// The payload is `{"channel": ..., "message": ...}`; any 2xx status
/// counts as delivered.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl NotifyAdapter for WebhookNotifier {
    async fn send(&self, channel: &str, message: &str) -> Result<(), NotifyError> {
        let url = self.url.clone();
        let body = serde_json::json!({
            "channel": channel,
            "message": message,
        })
        .to_string();

        // ureq is blocking; keep it off the async workers
        tokio::task::spawn_blocking(move || {
            ureq::post(&url)
                .header("content-type", "application/json")
                .send(body.as_bytes())
                .map(|_| ())
                .map_err(|e| NotifyError::SendFailed(e.to_string()))
        })
        .await
        .map_err(|e| NotifyError::SendFailed(format!("send task failed: {}", e)))?
    }
}
