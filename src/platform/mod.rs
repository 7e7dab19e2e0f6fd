pub mod telegram;

use async_trait::async_trait;
use serde_json::Value;
use teloxide::types::ChatId;

use crate::error::DeliveryError;

/// A text message received from the platform
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Chat to reply into
    pub chat_id: ChatId,
    /// The message text, never empty
    pub text: String,
}

/// Sends replies back to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` to `chat_id`, returning the platform's response body.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<Value, DeliveryError>;
}
