//! On-demand report command listener
//!
//! Long-polls the Telegram `getUpdates` endpoint and runs a report cycle
//! whenever a chat sends `/report`. The listener shares the [`Reporter`]
//! with the daily scheduler; each trigger produces an independent cycle
//! delivered to the chat that asked.

use crate::error::{Error, Result};
use crate::orchestrator::Reporter;
use crate::telegram::MessageSink;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Long-poll window requested from `getUpdates`
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before asking again
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Listens for chat commands and triggers report cycles
pub struct CommandListener<S: MessageSink> {
    http: reqwest::Client,
    api_base: String,
    token: String,
    reporter: Arc<Reporter<S>>,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    text: Option<String>,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl<S: MessageSink> CommandListener<S> {
    /// Create a listener for the configured bot
    pub fn new(api_base: &str, token: &str, reporter: Arc<Reporter<S>>) -> Result<Self> {
        // The HTTP timeout must outlast the long-poll window
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 20))
            .user_agent("rp-digest")
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            reporter,
        })
    }

    /// Poll for commands until `shutdown` fires
    ///
    /// A failed poll is logged and retried after a backoff; the listener
    /// never exits on its own.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("command listener started");
        let mut offset: Option<i64> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("command listener shutting down");
                    break;
                }
                polled = self.poll_updates(offset) => match polled {
                    Ok(updates) => {
                        for update in updates {
                            // Acknowledge before handling so a crash mid-cycle
                            // does not replay the command
                            offset = Some(update.update_id + 1);
                            self.handle_update(update).await;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "getUpdates poll failed, backing off");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = sleep(POLL_ERROR_BACKOFF) => {}
                        }
                    }
                },
            }
        }
    }

    async fn poll_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let url = format!("{}/bot{}/getUpdates", self.api_base, self.token);
        let mut query = vec![("timeout", POLL_TIMEOUT_SECS.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Delivery(format!(
                "getUpdates returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: UpdatesResponse = response.json().await?;
        if !body.ok {
            return Err(Error::Delivery("getUpdates returned ok=false".to_string()));
        }
        Ok(body.result)
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        if !is_report_command(text) {
            debug!(chat_id = message.chat.id, "ignoring non-command message");
            return;
        }

        info!(chat_id = message.chat.id, "report requested via chat command");
        // Cycle failures are logged inside the reporter and, where possible,
        // explained to the chat; the listener keeps polling either way
        if let Err(e) = self.reporter.run_report_cycle(message.chat.id).await {
            warn!(chat_id = message.chat.id, error = %e, "on-demand report cycle failed");
        }
    }
}

/// Whether a message text is the report command
///
/// Matches the first whitespace token only, with an optional `@botname`
/// suffix as sent from group chats.
fn is_report_command(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let command = first.split('@').next().unwrap_or(first);
    command == "/report"
}
