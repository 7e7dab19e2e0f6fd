use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use teloxide::types::{ChatId, ParseMode};
use tracing::{debug, error, info};

use crate::error::{DeliveryError, WebhookError};
use crate::platform::{IncomingMessage, Notifier};

/// The subset of a Bot API `Update` the webhook reads.
#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<UpdateMessage>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessage {
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Parse a raw webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, WebhookError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// The text message carried by this update, if any.
    ///
    /// Updates without a message or with empty text yield `None`; a text
    /// message with no chat is malformed.
    pub fn into_incoming(self) -> Result<Option<IncomingMessage>, WebhookError> {
        let Some(message) = self.message else {
            return Ok(None);
        };
        let text = match message.text {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(None),
        };
        let chat = message.chat.ok_or(WebhookError::MissingChat)?;
        Ok(Some(IncomingMessage {
            chat_id: ChatId(chat.id),
            text,
        }))
    }
}

/// Body of a `sendMessage` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub parse_mode: ParseMode,
}

impl OutboundMessage {
    pub fn html(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: ParseMode::Html,
        }
    }
}

/// Minimal Bot API client: one request per call, no retries.
pub struct TelegramClient {
    client: reqwest::Client,
    api_base: String,
}

impl TelegramClient {
    pub fn new(api_base: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, api_base })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// POST `sendMessage`. Any non-success status is a delivery failure.
    pub async fn send(&self, message: &OutboundMessage) -> Result<Value, DeliveryError> {
        debug!(
            "Sending message to chat {} ({} chars)",
            message.chat_id,
            message.text.chars().count()
        );

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(message)
            .send()
            .await
            .map_err(DeliveryError::from)
            .inspect_err(|e| error!("sendMessage request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("Telegram API error ({}): {}", status, body);
            return Err(DeliveryError::Status { status, body });
        }

        let result: Value =
            serde_json::from_str(&body).map_err(|_| DeliveryError::Decode { body })?;
        info!("Message delivered to chat {}", message.chat_id);
        Ok(result)
    }

    /// GET `getMe`. The body is returned whatever the status, so an
    /// `{"ok": false}` answer for a bad token is reported as-is.
    pub async fn get_me(&self) -> Result<Value, DeliveryError> {
        debug!("Calling getMe");

        let response = self.client.get(self.method_url("getMe")).send().await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| DeliveryError::Decode { body })
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<Value, DeliveryError> {
        self.send(&OutboundMessage::html(chat_id, text)).await
    }
}
