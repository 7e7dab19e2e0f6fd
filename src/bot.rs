use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use teloxide::types::ChatId;
use tracing::{info, warn};

use crate::config::ClockConfig;
use crate::error::DeliveryError;
use crate::platform::Notifier;

const COMMAND_PREFIX: char = '/';

const ECHO: &str = "/echo";

const WELCOME_TEXT: &str = "👋 Welcome to this bot!\nSend /help to see every available command.";

const HELP_TEXT: &str = "📝 Available commands:\n\
                         /start - Get started\n\
                         /help - Show this help\n\
                         /echo [text] - Repeat your message\n\
                         /time - Show the current time";

const UNKNOWN_TEXT: &str = "❌ Unknown command, send /help to see the available commands";

/// A recognized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Time,
    Echo(String),
    Unknown,
}

/// Command table, evaluated in order; first match wins.
const COMMANDS: &[(fn(&str) -> bool, fn(&str) -> Command)] = &[
    (|t| t == "/start", |_| Command::Start),
    (|t| t == "/help", |_| Command::Help),
    (|t| t == "/time", |_| Command::Time),
    (is_echo, echo_payload),
];

fn is_echo(text: &str) -> bool {
    text == ECHO || text.starts_with("/echo ")
}

/// Everything after the first space following `/echo`, verbatim.
fn echo_payload(text: &str) -> Command {
    Command::Echo(text.get(ECHO.len() + 1..).unwrap_or_default().to_string())
}

impl Command {
    /// `None` when `text` is not a command at all.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.starts_with(COMMAND_PREFIX) {
            return None;
        }
        let command = COMMANDS
            .iter()
            .find(|(matches, _)| matches(text))
            .map(|(_, build)| build(text))
            .unwrap_or(Command::Unknown);
        Some(command)
    }

    fn name(&self) -> Option<&'static str> {
        match self {
            Command::Start => Some("/start"),
            Command::Help => Some("/help"),
            Command::Time => Some("/time"),
            Command::Echo(_) => Some("/echo"),
            Command::Unknown => None,
        }
    }
}

/// Wall-clock settings for `/time`.
#[derive(Debug, Clone)]
pub struct Clock {
    zone_name: String,
    offset: FixedOffset,
}

impl Clock {
    pub fn new(config: &ClockConfig) -> Option<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes.checked_mul(60)?)?;
        Some(Self {
            zone_name: config.zone_name.clone(),
            offset,
        })
    }

    /// `2024/1/5 14:03:07` style local time.
    pub fn format(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .format("%Y/%-m/%-d %H:%M:%S")
            .to_string()
    }
}

/// Maps commands to replies and hands them to a [`Notifier`].
pub struct Dispatcher {
    clock: Clock,
}

impl Dispatcher {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn reply_text(&self, command: &Command, now: DateTime<Utc>) -> String {
        match command {
            Command::Start => WELCOME_TEXT.to_string(),
            Command::Help => HELP_TEXT.to_string(),
            Command::Time => format!(
                "🕒 Current time ({}): {}",
                self.clock.zone_name,
                self.clock.format(now)
            ),
            Command::Echo(rest) => rest.clone(),
            Command::Unknown => UNKNOWN_TEXT.to_string(),
        }
    }

    /// Send exactly one reply for a command line. Plain text gets no reply
    /// and yields `Ok(None)`.
    pub async fn dispatch<N: Notifier + ?Sized>(
        &self,
        notifier: &N,
        chat_id: ChatId,
        text: &str,
    ) -> Result<Option<Value>, DeliveryError> {
        let Some(command) = Command::parse(text) else {
            return Ok(None);
        };
        match command.name() {
            Some(name) => info!("Handling {} for chat {}", name, chat_id),
            None => warn!("Unknown command from chat {}: {}", chat_id, text),
        }

        let reply = self.reply_text(&command, Utc::now());
        notifier.send_message(chat_id, &reply).await.map(Some)
    }
}
