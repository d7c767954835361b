//! Chat transports.
//!
//! Each messenger implements the `Messenger` trait. The bot loop polls it for
//! events and answers through it; nothing above this layer knows which chat
//! platform is on the other end.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ── Core types ──────────────────────────────────────────────────────────────

/// Errors raised by a chat transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{platform} API error: {description}")]
    Api {
        platform: &'static str,
        description: String,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Messenger not initialized")]
    NotConnected,
}

/// A text message from an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub sender_id: i64,
    pub message_id: i64,
    pub text: String,
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub chat_id: i64,
    pub sender_id: i64,
    /// Message carrying the pressed keyboard; replies edit it in place.
    pub message_id: i64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerEvent {
    Message(IncomingMessage),
    Callback(CallbackQuery),
}

impl MessengerEvent {
    pub fn sender_id(&self) -> i64 {
        match self {
            Self::Message(m) => m.sender_id,
            Self::Callback(c) => c.sender_id,
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            Self::Message(m) => m.chat_id,
            Self::Callback(c) => c.chat_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Rows of buttons under a message. Serializes as Telegram's `reply_markup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        self.rows.push(buttons.into_iter().collect());
        self
    }

    /// One button per row.
    pub fn column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// Options for sending a message
#[derive(Debug, Default)]
pub struct SendOptions<'a> {
    pub chat_id: i64,
    pub content: &'a str,
    pub keyboard: Option<&'a InlineKeyboard>,
    pub reply_to: Option<i64>,
}

// ── Messenger trait ─────────────────────────────────────────────────────────

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Get the messenger name
    fn name(&self) -> &str;

    /// Get the messenger type (telegram, ...)
    fn messenger_type(&self) -> &str;

    /// Connect and authenticate.
    async fn initialize(&mut self) -> Result<(), TransportError>;

    /// Wait for the next batch of events. May block for the platform's long
    /// poll window; an empty batch is normal.
    async fn receive_events(&self) -> Result<Vec<MessengerEvent>, TransportError>;

    /// Send a message, returning its id.
    async fn send_message(&self, chat_id: i64, content: &str) -> Result<i64, TransportError> {
        self.send_message_with_options(SendOptions {
            chat_id,
            content,
            ..Default::default()
        })
        .await
    }

    /// Send a message with additional options
    async fn send_message_with_options(&self, opts: SendOptions<'_>)
        -> Result<i64, TransportError>;

    /// Replace the text and keyboard of a message the bot sent earlier.
    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        content: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;

    /// Check if the messenger is connected
    fn is_connected(&self) -> bool;
}

mod telegram;

pub use telegram::{parse_update, TelegramMessenger};
