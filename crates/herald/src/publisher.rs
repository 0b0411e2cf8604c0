use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

const LOG_TARGET: &str = "herald::publisher";

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Snafu)]
pub enum PublishError {
    #[snafu(display("Publishing cancelled"))]
    Cancelled,
    #[snafu(display("Delivery request failed"))]
    Http { source: reqwest::Error },
    #[snafu(display("Delivery rejected with {status}: {description}"))]
    Rejected {
        status: reqwest::StatusCode,
        description: String,
    },
}

pub type PublishResult<T> = std::result::Result<T, PublishError>;

impl PublishError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PublishError::Cancelled)
    }
}

/// Delivers an already formatted message to an output channel
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        channel: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> PublishResult<()>;
}

/// Telegram Bot API `sendMessage`, MarkdownV2 formatted
pub struct TelegramPublisher {
    client: reqwest::Client,
    send_message_url: Url,
}

impl TelegramPublisher {
    pub fn new(client: reqwest::Client, api_base: &Url, token: &str) -> Self {
        let mut send_message_url = api_base.clone();
        let path = format!(
            "{}/bot{token}/sendMessage",
            api_base.path().trim_end_matches('/')
        );
        send_message_url.set_path(&path);

        Self {
            client,
            send_message_url,
        }
    }

    async fn send_message(&self, channel: &str, text: &str) -> PublishResult<()> {
        let request = SendMessageRequest {
            chat_id: channel,
            text,
            parse_mode: "MarkdownV2",
        };
        let response = self
            .client
            .post(self.send_message_url.clone())
            .json(&request)
            .send()
            .await
            .context(HttpSnafu)?;

        let status = response.status();
        // Telegram reports failures in the body, usually along with a 4xx status
        let reply: Option<SendMessageResponse> = response.json().await.ok();

        match reply {
            Some(SendMessageResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(reply) => RejectedSnafu {
                status,
                description: reply.description.unwrap_or_default(),
            }
            .fail(),
            None => RejectedSnafu {
                status,
                description: "unreadable response",
            }
            .fail(),
        }
    }
}

#[async_trait::async_trait]
impl Publisher for TelegramPublisher {
    async fn publish(
        &self,
        channel: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> PublishResult<()> {
        debug!(target: LOG_TARGET, %channel, len = text.len(), "Sending message");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => CancelledSnafu.fail(),
            res = self.send_message(channel, text) => res,
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}
