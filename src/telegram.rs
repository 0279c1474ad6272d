//! Chat delivery boundary
//!
//! The orchestrator talks to a [`MessageSink`] trait; the production
//! implementation posts to the Telegram Bot API. Delivery is wrapped in the
//! async retry form so a flaky connection does not drop a digest, while API
//! rejections (bad token, unknown chat) escalate immediately as
//! [`Error::Delivery`].

use crate::config::{RetryConfig, TelegramConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Documented Telegram cap on message text length
pub const MESSAGE_CHAR_LIMIT: usize = 4096;

/// A capability that can deliver one text message to a chat
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver `text` to `chat_id`
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Telegram Bot API implementation of [`MessageSink`]
pub struct TelegramSink {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

impl TelegramSink {
    /// Create a sink for the configured bot
    pub fn new(config: &TelegramConfig, retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("rp-digest")
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            retry,
        })
    }

    async fn post_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Delivery(format!("sendMessage response was not valid JSON: {e}")))?;
        if body.ok {
            return Ok(());
        }

        let description = body
            .description
            .unwrap_or_else(|| "no description".to_string());
        match body.error_code {
            Some(code) => Err(Error::Delivery(format!(
                "sendMessage rejected ({code}): {description}"
            ))),
            None => Err(Error::Delivery(format!(
                "sendMessage rejected: {description}"
            ))),
        }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        with_retry(&self.retry, || self.post_message(chat_id, text)).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink_for(server: &MockServer) -> TelegramSink {
        TelegramSink::new(
            &TelegramConfig {
                api_base: server.uri(),
                token: "bot-token".to_string(),
                chat_id: -100,
            },
            RetryConfig {
                max_attempts: 1,
                initial_delay: Duration::from_millis(1),
                ..RetryConfig::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_message_posts_chat_id_text_and_preview_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botbot-token/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": -100,
                "text": "digest",
                "disable_web_page_preview": true,
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sink = sink_for(&server);
        sink.send_message(-100, "digest").await.unwrap();
    }

    #[tokio::test]
    async fn api_rejection_maps_to_delivery_error_with_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botbot-token/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found",
            })))
            .mount(&server)
            .await;

        let sink = sink_for(&server);
        let err = sink.send_message(-100, "digest").await.unwrap_err();
        match err {
            Error::Delivery(reason) => {
                assert!(reason.contains("chat not found"), "reason: {reason}");
                assert!(reason.contains("400"));
            }
            other => panic!("expected Delivery error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn api_rejection_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botbot-token/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = TelegramSink::new(
            &TelegramConfig {
                api_base: server.uri(),
                token: "bot-token".to_string(),
                chat_id: -100,
            },
            RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                ..RetryConfig::default()
            },
        )
        .unwrap();
        let err = sink.send_message(-100, "digest").await.unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
    }
}
