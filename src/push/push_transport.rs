use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;

use super::push_models::{PushPayload, Urgency};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push service request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A payload ready to be posted to one push endpoint.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub payload: PushPayload,
    pub ttl_seconds: u32,
    pub urgency: Urgency,
}

/// Outbound leg of the relay: one POST to one subscription endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Posts `message` to `endpoint` and returns the push service's HTTP status.
    async fn deliver(&self, endpoint: &str, message: &PushMessage) -> Result<u16, PushError>;
}

#[derive(Clone)]
pub struct HttpPushTransport {
    client: reqwest::Client,
}

impl HttpPushTransport {
    pub fn new(timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn deliver(&self, endpoint: &str, message: &PushMessage) -> Result<u16, PushError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header("TTL", message.ttl_seconds.to_string())
            .header("Urgency", message.urgency.as_str())
            .json(&message.payload)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}
