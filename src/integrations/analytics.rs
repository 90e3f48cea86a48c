use async_trait::async_trait;
use serde_json::json;

use crate::{
    config::AnalyticsConfig,
    error::{AppError, Result},
    integrations::{EntitlementNotification, Notifier},
};

/// Server-side purchase ping to the analytics collector. Value is sent
/// in major units since that is what the collector expects.
pub struct AnalyticsNotifier {
    config: AnalyticsConfig,
    client: reqwest::Client,
}

impl AnalyticsNotifier {
    pub fn new(config: Option<AnalyticsConfig>) -> Option<Self> {
        config.and_then(|cfg| {
            if cfg.enabled {
                Some(Self {
                    config: cfg,
                    client: reqwest::Client::new(),
                })
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl Notifier for AnalyticsNotifier {
    fn name(&self) -> &str {
        "Analytics"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn notify(&self, event: &EntitlementNotification) -> Result<()> {
        let payload = json!({
            "client_id": event.user_id.to_string(),
            "events": [{
                "name": "purchase",
                "params": {
                    "transaction_id": event.transaction_id,
                    "value": event.amount as f64 / 100.0,
                    "currency": event.currency,
                    "venue_id": event.venue_id.to_string(),
                    "venue_name": event.venue_name,
                    "mode": event.mode.to_string(),
                }
            }]
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("api_secret", self.config.api_secret.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Analytics error: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "Analytics collector returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
