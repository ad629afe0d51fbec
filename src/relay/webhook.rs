//! Webhook delivery
//!
//! One POST per notification. No retry, no queue.

use std::sync::Arc;

use crate::error::AppError;
use crate::metrics::WEBHOOK_DELIVERIES_TOTAL;

/// Sends JSON notifications to the configured webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: Arc<reqwest::Client>,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(http_client: Arc<reqwest::Client>, url: Option<&str>) -> Self {
        Self {
            http_client,
            url: url.map(ToOwned::to_owned),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver a payload
    ///
    /// # Errors
    /// `WebhookMisconfigured` without a URL (nothing is sent),
    /// `WebhookDelivery` on network failure or a non-2xx answer
    pub async fn send(&self, payload: &serde_json::Value) -> Result<(), AppError> {
        let url = self.url.as_deref().ok_or(AppError::WebhookMisconfigured)?;

        let result = match self.http_client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(AppError::WebhookDelivery(format!(
                "webhook rejected notification: HTTP {}",
                response.status()
            ))),
            Err(e) => Err(AppError::WebhookDelivery(format!(
                "webhook request failed: {}",
                e.without_url()
            ))),
        };

        let status = if result.is_ok() { "success" } else { "failure" };
        WEBHOOK_DELIVERIES_TOTAL.with_label_values(&[status]).inc();

        result
    }
}
