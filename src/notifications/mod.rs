//! Completion notifications.
//!
//! A [`Notifier`] delivers a [`CompletionMessage`] to the push endpoint a
//! user registered. The subscription descriptor is opaque here: it is handed
//! to the delivery backend untouched.

pub mod push;

pub use push::PushGatewayNotifier;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trimforge_common::{NotifyError, OperationId};

use crate::config::PushConfig;

/// What a user is told when their operation finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub operation_id: OperationId,
    pub output_ref: String,
    pub title: String,
    pub body: String,
}

impl CompletionMessage {
    /// The message sent for a finished trim.
    pub fn finished(operation_id: OperationId, output_ref: &str) -> Self {
        Self {
            operation_id,
            output_ref: output_ref.to_string(),
            title: "Your video is ready".to_string(),
            body: format!("Trimmed video {output_ref} is ready to download."),
        }
    }
}

/// Delivers completion messages to a subscription.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Deliver `message` to the endpoint described by `subscription`.
    async fn notify(&self, subscription: &[u8], message: &CompletionMessage)
        -> Result<(), NotifyError>;
}

/// Used when no push gateway is configured: logs and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn notify(
        &self,
        _subscription: &[u8],
        message: &CompletionMessage,
    ) -> Result<(), NotifyError> {
        tracing::debug!(
            operation_id = %message.operation_id,
            "Push gateway not configured, dropping notification"
        );
        Ok(())
    }
}

/// Pick the notifier the configuration asks for.
pub fn from_config(config: &PushConfig) -> Arc<dyn Notifier> {
    match config.gateway_url.as_deref() {
        Some(url) => Arc::new(PushGatewayNotifier::new(
            url,
            config.api_key.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
        )),
        None => Arc::new(DisabledNotifier),
    }
}
