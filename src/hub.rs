//! Subscription requests sent to a hub.

use crate::subscription::{Mode, Subscription};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Hub reply bodies are proxied to callers; anything past this is dropped.
const MAX_HUB_REPLY_SIZE: usize = 64 * 1024; // 64KB

/// Errors that can occur while talking to a hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// The stored hub is not an absolute http(s) URL
    #[error("invalid hub URL: {0}")]
    InvalidUrl(String),
    /// HTTP request failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("hub request timed out")]
    Timeout,
}

/// How the hub answered a subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubReply {
    /// 202 Accepted: verification of intent will follow.
    Accepted,
    /// Any other status, with the hub's body (capped).
    Rejected { status: StatusCode, body: Vec<u8> },
}

/// A form-encoded subscribe or unsubscribe request for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubRequest {
    pub hub: String,
    pub callback: String,
    pub topic: String,
    pub mode: Mode,
    pub lease_seconds: Option<i64>,
}

impl HubRequest {
    /// Builds the request for `subscription` in `mode`.
    ///
    /// The stored lease is only requested when subscribing.
    pub fn new(subscription: &Subscription, mode: Mode) -> Self {
        Self {
            hub: subscription.hub.clone(),
            callback: subscription.callback.clone(),
            topic: subscription.topic.clone(),
            mode,
            lease_seconds: match mode {
                Mode::Subscribe => subscription.lease_seconds,
                Mode::Unsubscribe => None,
            },
        }
    }

    /// `hub.*` fields in wire order. `hub.lease_seconds` only when set.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("hub.callback", self.callback.clone()),
            ("hub.topic", self.topic.clone()),
            ("hub.verify", "sync".to_owned()),
            ("hub.mode", self.mode.as_str().to_owned()),
        ];
        if let Some(lease) = self.lease_seconds {
            fields.push(("hub.lease_seconds", lease.to_string()));
        }
        fields
    }

    /// The `application/x-www-form-urlencoded` request body.
    pub fn form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form_fields())
            .finish()
    }

    /// POSTs the request to the hub. No retries.
    ///
    /// # Errors
    ///
    /// Returns [`HubError`] when the hub URL is unusable, the request fails
    /// or the timeout elapses. Non-202 replies are not errors; they come back
    /// as [`HubReply::Rejected`].
    pub async fn send(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<HubReply, HubError> {
        let url = Url::parse(&self.hub).map_err(|e| HubError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HubError::InvalidUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        tracing::info!(
            hub = %self.hub,
            topic = %self.topic,
            callback = %self.callback,
            mode = %self.mode,
            "Sending hub request"
        );

        let request = client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(self.form_body())
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| HubError::Timeout)?
            .map_err(HubError::Network)?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(HubReply::Accepted);
        }

        let body = tokio::time::timeout(timeout, read_reply_bytes(response))
            .await
            .map_err(|_| HubError::Timeout)??;

        tracing::warn!(
            hub = %self.hub,
            topic = %self.topic,
            status = %status,
            "Hub did not accept request"
        );

        Ok(HubReply::Rejected { status, body })
    }
}

/// Reads at most `MAX_HUB_REPLY_SIZE` bytes of the reply body.
async fn read_reply_bytes(response: reqwest::Response) -> Result<Vec<u8>, HubError> {
    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(HubError::Network)?;
        let room = MAX_HUB_REPLY_SIZE - bytes.len();
        if chunk.len() >= room {
            bytes.extend_from_slice(&chunk[..room]);
            break;
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
