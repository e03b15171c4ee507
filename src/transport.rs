//! Outbound transport: deliver one chat turn to the agent webhook.
//!
//! The orchestrator only depends on the [`Transport`] trait; the production
//! implementation is [`WebhookTransport`] (reqwest, JSON over HTTPS with a
//! bearer token). The overall timeout is applied by the caller, so dropping
//! the returned future is how a request is aborted.

use crate::error::{ChatError, TransportError};
use crate::pipeline::input::{is_url, FileDescriptor};
use crate::pipeline::normalize::RawResponse;
use crate::session::Credential;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// JSON body of one chat turn, exactly as the agent workflow expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPayload {
    pub chat_input: String,
    pub user_id: String,
    pub session_id: String,
    pub email: String,
    /// ISO-8601, UTC, millisecond precision (`2024-05-01T09:30:00.000Z`).
    pub timestamp: String,
    /// Extracted attachment text; empty when nothing is attached.
    pub file_context: String,
    pub attached_files: Vec<FileDescriptor>,
}

/// Format a timestamp the way the payload carries it.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Something that can deliver a payload and hand back the raw reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        payload: &OutboundPayload,
        credential: &Credential,
    ) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] that POSTs to an HTTP(S) webhook.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, ChatError> {
        let url = url.into();
        if !is_url(&url) {
            return Err(ChatError::InvalidConfig(format!(
                "webhook URL must be http:// or https://, got '{}'",
                url
            )));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ChatError::HttpClient(e.to_string()))?;
        Ok(Self { url, client })
    }

    /// Build from [`crate::ClientConfig::webhook_url`].
    pub fn from_config(config: &crate::ClientConfig) -> Result<Self, ChatError> {
        match &config.webhook_url {
            Some(url) => Self::new(url.clone()),
            None => Err(ChatError::MissingWebhookUrl),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn post(
        &self,
        payload: &OutboundPayload,
        credential: &Credential,
    ) -> Result<RawResponse, TransportError> {
        info!(
            "Posting chat turn ({} chars, {} files)",
            payload.chat_input.len(),
            payload.attached_files.len()
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(credential.expose())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout { secs: 0 }
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        debug!("Agent replied with {} bytes", body.len());

        Ok(RawResponse::from_body(&body))
    }
}
