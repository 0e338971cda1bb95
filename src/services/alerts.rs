//! Outbound alerting for webhook processing failures. The webhook
//! endpoint always acknowledges the gateway, so a failed order is
//! otherwise only visible by polling the admin list; this hook pushes
//! the failure somewhere an operator will see it.

use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::ServiceError;

pub struct AlertNotifier {
    http: reqwest::Client,
    url: Option<String>,
}

impl AlertNotifier {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("failed to build http client: {e}")))?;
        Ok(Self { http, url })
    }

    /// A notifier with no destination; every call is a no-op.
    pub fn disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            url: None,
        }
    }

    /// Fire-and-forget: delivery problems are logged, never propagated
    /// into the webhook path.
    pub async fn webhook_failure(&self, provider: &str, event_id: &str, error: &str) {
        let Some(url) = &self.url else {
            debug!(provider, event_id, "alert webhook not configured");
            return;
        };

        let payload = json!({
            "source": "kedai-api",
            "kind": "webhook_failure",
            "provider": provider,
            "event_id": event_id,
            "error": error,
            "at": Utc::now().to_rfc3339(),
        });

        match self.http.post(url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "alert webhook rejected the notification");
            }
            Err(e) => {
                warn!(error = %e, "alert webhook delivery failed");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn failure_notifications_reach_the_configured_hook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(body_string_contains("webhook_failure"))
            .and(body_string_contains("abc:TP123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = AlertNotifier::new(
            Some(format!("{}/alerts", server.uri())),
            Duration::from_secs(2),
        )
        .unwrap();
        notifier
            .webhook_failure("toyyibpay", "abc:TP123", "Verification failed")
            .await;
    }

    #[tokio::test]
    async fn disabled_notifier_is_silent() {
        AlertNotifier::disabled()
            .webhook_failure("toyyibpay", "abc:TP123", "whatever")
            .await;
    }
}
