//! Telegram messenger using Bot API long polling.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use super::{
    CallbackQuery, IncomingMessage, InlineKeyboard, Messenger, MessengerEvent, SendOptions,
    TransportError,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Seconds Telegram holds a `getUpdates` request open.
const LONG_POLL_SECS: u64 = 25;

/// Client timeout; must outlast the long poll window.
const HTTP_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_SECS + 10);

/// Telegram messenger using bot API
pub struct TelegramMessenger {
    name: String,
    bot_token: String,
    api_base: String,
    connected: AtomicBool,
    http: reqwest::Client,
    /// Highest update id seen; the next poll asks for everything after it.
    last_update_id: AtomicI64,
}

impl TelegramMessenger {
    pub fn new(name: String, bot_token: String) -> Result<Self, TransportError> {
        Self::with_api_base(name, bot_token, "https://api.telegram.org".to_string())
    }

    /// Point at a different Bot API server (self-hosted or test double).
    pub fn with_api_base(
        name: String,
        bot_token: String,
        api_base: String,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            name,
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            connected: AtomicBool::new(false),
            http,
            last_update_id: AtomicI64::new(0),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// POST a Bot API method and unwrap the `{ok, result}` envelope.
    async fn call(&self, method: &str, payload: &Value) -> Result<Value, TransportError> {
        let resp = self
            .http
            .post(self.api_url(method))
            .json(payload)
            .send()
            .await?;
        let data: Value = resp.json().await?;
        if data["ok"].as_bool() == Some(true) {
            return Ok(data["result"].clone());
        }
        Err(TransportError::Api {
            platform: "Telegram",
            description: data["description"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        })
    }

    /// Like `call`, but resends without `parse_mode` when Telegram cannot
    /// parse the Markdown (command output often has stray `_` or `*`).
    async fn call_markdown(&self, method: &str, mut payload: Value) -> Result<Value, TransportError> {
        match self.call(method, &payload).await {
            Err(TransportError::Api { description, .. })
                if description.contains("can't parse entities") =>
            {
                debug!(method, "Markdown rejected, resending as plain text");
                if let Some(obj) = payload.as_object_mut() {
                    obj.remove("parse_mode");
                }
                self.call(method, &payload).await
            }
            other => other,
        }
    }

    /// Move the offset past updates queued while the bot was offline, so
    /// stale commands and button presses are never replayed.
    async fn skip_backlog(&self) -> Result<(), TransportError> {
        let result = self
            .call("getUpdates", &json!({ "offset": -1, "timeout": 0 }))
            .await?;
        let latest = result
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|update| update["update_id"].as_i64())
            .max();
        if let Some(update_id) = latest {
            self.last_update_id.fetch_max(update_id, Ordering::SeqCst);
            info!(update_id, "Dropped pending updates");
        }
        Ok(())
    }
}

/// Turn one `getUpdates` entry into an event. Updates without text or
/// callback data are dropped.
pub fn parse_update(update: &Value) -> Option<MessengerEvent> {
    if let Some(msg) = update.get("message") {
        return Some(MessengerEvent::Message(IncomingMessage {
            chat_id: msg["chat"]["id"].as_i64()?,
            sender_id: msg["from"]["id"].as_i64()?,
            message_id: msg["message_id"].as_i64()?,
            text: msg["text"].as_str()?.to_string(),
        }));
    }
    if let Some(query) = update.get("callback_query") {
        return Some(MessengerEvent::Callback(CallbackQuery {
            id: query["id"].as_str()?.to_string(),
            chat_id: query["message"]["chat"]["id"].as_i64()?,
            sender_id: query["from"]["id"].as_i64()?,
            message_id: query["message"]["message_id"].as_i64()?,
            data: query["data"].as_str()?.to_string(),
        }));
    }
    None
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn name(&self) -> &str {
        &self.name
    }

    fn messenger_type(&self) -> &str {
        "telegram"
    }

    async fn initialize(&mut self) -> Result<(), TransportError> {
        // Verify bot token with getMe
        let me = self.call("getMe", &json!({})).await?;
        info!(
            username = me["username"].as_str().unwrap_or("?"),
            "Telegram bot authenticated"
        );
        self.skip_backlog().await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn receive_events(&self) -> Result<Vec<MessengerEvent>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let result = self
            .call(
                "getUpdates",
                &json!({
                    "offset": self.last_update_id.load(Ordering::SeqCst) + 1,
                    "timeout": LONG_POLL_SECS,
                    "allowed_updates": ["message", "callback_query"]
                }),
            )
            .await?;

        let updates = result
            .as_array()
            .ok_or_else(|| TransportError::Decode("getUpdates result is not an array".into()))?;

        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(update_id) = update["update_id"].as_i64() {
                self.last_update_id.fetch_max(update_id, Ordering::SeqCst);
            }
            match parse_update(update) {
                Some(event) => events.push(event),
                None => debug!(update = %update, "Ignoring unsupported update"),
            }
        }
        Ok(events)
    }

    async fn send_message_with_options(
        &self,
        opts: SendOptions<'_>,
    ) -> Result<i64, TransportError> {
        let mut payload = json!({
            "chat_id": opts.chat_id,
            "text": opts.content,
            "parse_mode": "Markdown"
        });

        if let Some(keyboard) = opts.keyboard {
            payload["reply_markup"] = json!(keyboard);
        }

        if let Some(reply_to) = opts.reply_to {
            payload["reply_to_message_id"] = json!(reply_to);
        }

        let result = self.call_markdown("sendMessage", payload).await?;
        result["message_id"]
            .as_i64()
            .ok_or_else(|| TransportError::Decode("sendMessage returned no message_id".into()))
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        content: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": content,
            "parse_mode": "Markdown"
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = json!(keyboard);
        }

        match self.call_markdown("editMessageText", payload).await {
            Ok(_) => Ok(()),
            // Pressing "refresh" on an unchanged report
            Err(TransportError::Api { description, .. })
                if description.contains("message is not modified") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        if let Err(e) = self
            .call("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))
            .await
        {
            // Stale queries (older than ~15 minutes) cannot be answered.
            warn!(error = %e, "Failed to answer callback query");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let tg = TelegramMessenger::new("bot".into(), "123:abc".into()).unwrap();
        assert_eq!(
            tg.api_url("getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
        let local =
            TelegramMessenger::with_api_base("bot".into(), "t".into(), "http://localhost:8081/".into())
                .unwrap();
        assert_eq!(local.api_url("getUpdates"), "http://localhost:8081/bott/getUpdates");
    }

    #[test]
    fn test_parse_text_message() {
        let update = json!({
            "update_id": 10,
            "message": {
                "message_id": 3,
                "from": {"id": 42},
                "chat": {"id": 42},
                "text": "/status"
            }
        });
        assert_eq!(
            parse_update(&update),
            Some(MessengerEvent::Message(IncomingMessage {
                chat_id: 42,
                sender_id: 42,
                message_id: 3,
                text: "/status".into(),
            }))
        );
    }

    #[test]
    fn test_parse_callback_query() {
        let update = json!({
            "update_id": 11,
            "callback_query": {
                "id": "abc",
                "from": {"id": 7},
                "message": {"message_id": 99, "chat": {"id": -100}},
                "data": "disk_status"
            }
        });
        let Some(MessengerEvent::Callback(query)) = parse_update(&update) else {
            panic!("expected callback");
        };
        assert_eq!(query.data, "disk_status");
        assert_eq!(query.chat_id, -100);
        assert_eq!(query.message_id, 99);
    }

    #[test]
    fn test_non_text_updates_dropped() {
        let photo = json!({
            "update_id": 12,
            "message": {"message_id": 1, "from": {"id": 1}, "chat": {"id": 1}, "photo": []}
        });
        assert_eq!(parse_update(&photo), None);
        assert_eq!(parse_update(&json!({"update_id": 13, "poll": {}})), None);
    }

    #[tokio::test]
    async fn test_poll_before_initialize_fails() {
        let tg = TelegramMessenger::new("bot".into(), "t".into()).unwrap();
        assert!(matches!(
            tg.receive_events().await,
            Err(TransportError::NotConnected)
        ));
    }
}
