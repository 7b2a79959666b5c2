use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

/// Push gateway client.
///
/// Sends exactly one push message per call to the configured gateway as a
/// JSON `POST {token, title, body, data}`. Delivery errors are reported to
/// the caller but never retried here.
pub struct PushClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct PushMessage<'a> {
    token: &'a str,
    title: &'a str,
    body: &'a str,
    data: serde_json::Value,
}

impl PushClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    /// Send a single push notification to a device token.
    pub async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let message = PushMessage {
            token,
            title,
            body,
            data,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Push gateway error {}: {}", status, body);
            anyhow::bail!("Push gateway error {}: {}", status, body);
        }

        info!("Push notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_client_creation() {
        let client = PushClient::new("https://push.example.com/send".to_string());
        assert_eq!(client.endpoint, "https://push.example.com/send");
    }

    #[test]
    fn test_message_shape() {
        let message = PushMessage {
            token: "tok",
            title: "Pickup scheduled",
            body: "Branch approved your pickup",
            data: serde_json::json!({"url": "/dashboard/abc"}),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["token"], "tok");
        assert_eq!(value["data"]["url"], "/dashboard/abc");
    }
}
