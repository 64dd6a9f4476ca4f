//! Slack Web API client.
//!
//! Speaks the three `chat.*` methods the workflow needs. Slack reports
//! failures inside a 200 response (`"ok": false` plus an error code), so the
//! client checks both the HTTP status and the envelope.

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::types::{ChannelId, NotificationHandle};

use super::ChatApi;
use super::types::Attachment;

/// Default Slack Web API base URL.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Errors returned by chat API calls.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request itself failed (connect, timeout, body read).
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack answered but rejected the call (`ok: false` or non-success
    /// status).
    #[error("chat API rejected the call: {0}")]
    Api(String),
}

// Envelope common to all chat.* responses.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// A Slack Web API client holding a bot token.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl SlackClient {
    /// Creates a client for the public Slack API.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, SLACK_API_BASE)
    }

    /// Creates a client against a different API base. Used by tests to point
    /// at a local mock server.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        SlackClient {
            http: reqwest::Client::new(),
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call(
        &self,
        api_method: &str,
        body: &serde_json::Value,
    ) -> Result<ApiResponse, ChatError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, api_method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Api(format!("HTTP {status}: {text}")));
        }

        let envelope: ApiResponse = response.json().await?;
        if !envelope.ok {
            return Err(ChatError::Api(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(envelope)
    }
}

impl ChatApi for SlackClient {
    type Error = ChatError;

    async fn post_message(
        &self,
        channel: &ChannelId,
        attachments: Vec<Attachment>,
    ) -> Result<NotificationHandle, ChatError> {
        let body = json!({
            "channel": channel,
            "as_user": true,
            "attachments": attachments,
        });
        let envelope = self.call("chat.postMessage", &body).await?;

        let ts = envelope
            .ts
            .ok_or_else(|| ChatError::Api("chat.postMessage response missing ts".to_string()))?;
        // Slack resolves channel names to ids; prefer the resolved id so
        // later update/delete calls address the message unambiguously.
        let channel = envelope
            .channel
            .map(ChannelId::new)
            .unwrap_or_else(|| channel.clone());

        Ok(NotificationHandle::new(channel, ts))
    }

    async fn update_message(
        &self,
        handle: &NotificationHandle,
        attachments: Vec<Attachment>,
    ) -> Result<(), ChatError> {
        let body = json!({
            "channel": handle.channel,
            "ts": handle.ts,
            "attachments": attachments,
        });
        self.call("chat.update", &body).await?;
        Ok(())
    }

    async fn delete_message(&self, handle: &NotificationHandle) -> Result<(), ChatError> {
        let body = json!({
            "channel": handle.channel,
            "ts": handle.ts,
        });
        self.call("chat.delete", &body).await?;
        Ok(())
    }
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
