//! Telegram Bot API client.
//!
//! Implements the two outbound surfaces the service needs:
//! - [`ChatTransport`] for delivering alerts (`sendMessage`, `sendPhoto`)
//! - [`CommandSource`](crate::service::CommandSource) via [`TelegramPoller`],
//!   which long-polls `getUpdates` for the trigger command
//!
//! Transport failures are classified for the retry policy: connection-level
//! errors, HTTP 429 and 5xx are transient; any other HTTP status is
//! permanent.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::TelegramSettings;
use crate::dispatch::{ChatId, ChatTransport, TransportError, TransportErrorKind};
use crate::service::{CommandSource, Trigger};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
/// Margin added to the long-poll timeout before the HTTP read times out.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 200;

/// Telegram Bot API client over a shared HTTP agent.
#[derive(Clone)]
pub struct TelegramClient {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(settings: &TelegramSettings) -> Self {
        Self {
            agent: ureq::builder().build(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Fetch pending updates with long polling.
    pub fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let response = self
            .agent
            .get(&self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs) + POLL_TIMEOUT_MARGIN)
            .query("offset", &offset.to_string())
            .query("timeout", &timeout_secs.to_string())
            .call()
            .context("getUpdates request failed")?;
        let body = response
            .into_string()
            .context("read getUpdates response")?;
        let parsed: UpdatesResponse =
            serde_json::from_str(&body).context("parse getUpdates response")?;
        if !parsed.ok {
            anyhow::bail!("getUpdates returned ok=false");
        }
        Ok(parsed.result)
    }
}

impl ChatTransport for TelegramClient {
    fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({ "chat_id": chat, "text": text });
        self.agent
            .post(&self.method_url("sendMessage"))
            .timeout(SEND_TIMEOUT)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map(|_| ())
            .map_err(|e| classify("sendMessage", e))
    }

    fn send_photo(
        &self,
        chat: ChatId,
        jpeg: &[u8],
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        let boundary = multipart_boundary();
        let body = multipart_photo_body(&boundary, chat, caption, jpeg);
        self.agent
            .post(&self.method_url("sendPhoto"))
            .timeout(SEND_TIMEOUT)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map(|_| ())
            .map_err(|e| classify("sendPhoto", e))
    }
}

/// Long-polling command source for the service loop.
pub struct TelegramPoller {
    client: TelegramClient,
    offset: i64,
    timeout_secs: u64,
    command: String,
}

impl TelegramPoller {
    pub fn new(client: TelegramClient, timeout_secs: u64, command: String) -> Self {
        Self {
            client,
            offset: 0,
            timeout_secs,
            command,
        }
    }
}

impl CommandSource for TelegramPoller {
    fn next_triggers(&mut self) -> Result<Vec<Trigger>> {
        let updates = self.client.get_updates(self.offset, self.timeout_secs)?;
        let mut triggers = Vec::new();
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            if text.trim() == self.command {
                triggers.push(Trigger {
                    chat: message.chat.id,
                });
            } else {
                log::debug!("ignoring message without trigger command");
            }
        }
        Ok(triggers)
    }
}

/// One entry from `getUpdates`.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

fn classify(method: &str, error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Status(code, response) => {
            let kind = if code == 429 || code >= 500 {
                TransportErrorKind::Transient
            } else {
                TransportErrorKind::Permanent
            };
            let mut body = response.into_string().unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            TransportError {
                kind,
                message: format!("{}: HTTP {}: {}", method, code, body.trim()),
            }
        }
        ureq::Error::Transport(transport) => {
            TransportError::transient(format!("{}: {}", method, transport))
        }
    }
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("watchpost-{:x}", nanos)
}

fn multipart_photo_body(
    boundary: &str,
    chat: ChatId,
    caption: Option<&str>,
    jpeg: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(jpeg.len() + 512);
    let text_field = |body: &mut Vec<u8>, name: &str, value: &str| {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    };

    text_field(&mut body, "chat_id", &chat.to_string());
    if let Some(caption) = caption {
        text_field(&mut body, "caption", caption);
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"photo\"; \
             filename=\"detection.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(jpeg);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_wraps_photo_bytes() {
        let body = multipart_photo_body("b123", 42, Some("one person"), b"JPEGDATA");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("name=\"chat_id\"\r\n\r\n42"));
        assert!(text.contains("name=\"caption\"\r\n\r\none person"));
        assert!(text.contains("Content-Type: image/jpeg"));
        assert!(text.contains("JPEGDATA"));
        assert!(text.ends_with("--b123--\r\n"));
    }

    #[test]
    fn multipart_body_omits_absent_caption() {
        let body = multipart_photo_body("b123", 42, None, b"JPEGDATA");
        assert!(!String::from_utf8_lossy(&body).contains("caption"));
    }

    #[test]
    fn update_payload_parses_chat_and_text() {
        let raw = r#"{
            "ok": true,
            "result": [
                {
                    "update_id": 1001,
                    "message": {
                        "message_id": 5,
                        "chat": {"id": 77, "type": "private"},
                        "text": "/photo"
                    }
                },
                {"update_id": 1002}
            ]
        }"#;
        let parsed: UpdatesResponse = serde_json::from_str(raw).expect("parse");
        assert!(parsed.ok);
        assert_eq!(parsed.result.len(), 2);
        let message = parsed.result[0].message.as_ref().expect("message");
        assert_eq!(message.chat.id, 77);
        assert_eq!(message.text.as_deref(), Some("/photo"));
        assert!(parsed.result[1].message.is_none());
    }
}
