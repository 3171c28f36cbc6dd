//! Webhook notifications
//!
//! Posts `{"content": "..."}` to a chat webhook (Discord-compatible) when
//! documents are created. Delivery problems are logged and otherwise ignored.

use serde::Serialize;

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Optional outbound webhook
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        match &webhook_url {
            Some(_) => tracing::info!("Webhook notifications enabled"),
            None => tracing::debug!("Webhook URL is not configured"),
        }

        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Send `message` and wait for the webhook to answer
    pub async fn notify(&self, message: &str) {
        let Some(url) = &self.webhook_url else {
            return;
        };

        let result = self
            .client
            .post(url)
            .json(&WebhookMessage { content: message })
            .send()
            .await;

        match result {
            Ok(res) if res.status().is_success() => {
                tracing::debug!("Sent webhook notification");
            }
            Ok(res) => {
                let status = res.status();
                let body = res.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body, "Webhook rejected notification");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send webhook notification");
            }
        }
    }

    /// Send `message` without holding up the caller
    pub fn notify_in_background(&self, message: String) {
        if !self.is_enabled() {
            return;
        }

        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.notify(&message).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_is_noop() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        notifier.notify("ignored").await;
        notifier.notify_in_background("ignored".to_string());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_does_not_panic() {
        let notifier = Notifier::new(Some("http://127.0.0.1:9/webhook".to_string()));
        assert!(notifier.is_enabled());
        notifier.notify("hello").await;
    }

    #[test]
    fn test_message_shape() {
        let body = serde_json::to_value(WebhookMessage { content: "hi" }).unwrap();
        assert_eq!(body, serde_json::json!({ "content": "hi" }));
    }
}
