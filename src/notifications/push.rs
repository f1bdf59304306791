use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use trimforge_common::NotifyError;

use super::{CompletionMessage, Notifier};

/// Posts completion messages to an HTTP push gateway.
///
/// Request body: `{"subscription": "<base64 descriptor>", "message": {...}}`.
pub struct PushGatewayNotifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    subscription: String,
    message: &'a CompletionMessage,
}

impl PushGatewayNotifier {
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            url: url.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl Notifier for PushGatewayNotifier {
    fn name(&self) -> &'static str {
        "push-gateway"
    }

    async fn notify(
        &self,
        subscription: &[u8],
        message: &CompletionMessage,
    ) -> Result<(), NotifyError> {
        let body = PushRequest {
            subscription: STANDARD.encode(subscription),
            message,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::delivery_failed(format!("push gateway unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::delivery_failed(format!(
                "push gateway returned {status}: {text}"
            )));
        }

        Ok(())
    }
}
