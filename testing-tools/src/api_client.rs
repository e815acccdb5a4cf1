use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Broadcasts a notification through `POST /notifications` and returns the
    /// server's broadcast report.
    pub async fn publish(&self, id: &str, event: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/notifications", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "id": id,
                "event": event,
                "payload": payload,
            }))
            .send()
            .await
            .context("Failed to publish notification")?;

        Self::data(response, "publish notification").await
    }

    pub async fn stats(&self) -> Result<Value> {
        let url = format!("{}/notifications/stats", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to get hub stats")?;

        Self::data(response, "get hub stats").await
    }

    async fn data(response: reqwest::Response, action: &str) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to {}: {} - Response: {}", action, status, body);
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", action))?;

        Ok(body["data"].clone())
    }
}
