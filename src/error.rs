use std::error::Error as _;

use reqwest::StatusCode;
use thiserror::Error;

/// A Bot API call that did not produce a usable response.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Telegram API error: {status} - {body}")]
    Status { status: StatusCode, body: String },
    #[error("Telegram API request timed out")]
    Timeout,
    #[error("Telegram API request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Telegram API returned a non-JSON body: {body}")]
    Decode { body: String },
}

impl DeliveryError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryError::Status { status, .. } => Some(*status),
            DeliveryError::Network(e) => e.status(),
            _ => None,
        }
    }
}

/// The request URL embeds the bot token, so it is dropped here before the
/// error can reach a log line or a response body.
impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Network(e.without_url())
        }
    }
}

/// Failure while handling one webhook update.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Malformed update: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Malformed update: message has text but no chat")]
    MissingChat,
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// The error and its causes, one per line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    lines.join("\n")
}

impl WebhookError {
    pub fn trace(&self) -> String {
        match self {
            // transparent: the first source is the delivery error itself
            WebhookError::Delivery(e) => error_chain(e),
            other => match other.source() {
                Some(_) => error_chain(other),
                None => format!("{:?}", other),
            },
        }
    }
}
