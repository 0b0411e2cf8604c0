use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

const LOG_TARGET: &str = "herald::summarizer";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_PROMPT: &str = "You are a news editor. Summarize the following article in two or three \
     sentences, in the same language as the article. Do not add any introduction.";

/// Longer input is cut off before sending
pub const MAX_INPUT_CHARS: usize = 12_000;

const MAX_TOKENS: u32 = 256;
const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 1.0;

#[derive(Debug, Snafu)]
pub enum SummarizeError {
    #[snafu(display("Summarization cancelled"))]
    Cancelled,
    #[snafu(display("Completion request failed"))]
    Http { source: reqwest::Error },
    #[snafu(display("Completion API responded with {status}: {body}"))]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[snafu(display("Completion API returned no choices"))]
    EmptyReply,
}

pub type SummarizeResult<T> = std::result::Result<T, SummarizeError>;

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// Short synopsis of `text`; empty when summarization is turned off
    async fn summarize(&self, text: &str, cancel: &CancellationToken) -> SummarizeResult<String>;
}

/// OpenAI compatible chat completion summarizer
///
/// Without an api key it is disabled and every summary is empty.
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: Url,
    model: String,
    prompt: String,
}

#[bon::bon]
impl OpenAiSummarizer {
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: Url,
        #[builder(default = DEFAULT_MODEL.to_owned(), into)] model: String,
        #[builder(default = DEFAULT_PROMPT.to_owned(), into)] prompt: String,
    ) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let endpoint = chat_completions_url(&base_url);
        info!(target: LOG_TARGET, enabled = api_key.is_some(), %model, "Summarizer created");

        Self {
            client,
            api_key,
            endpoint,
            model,
            prompt,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, api_key: &str, text: &str) -> SummarizeResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context(HttpSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return HttpStatusSnafu { status, body }.fail();
        }

        let reply: ChatResponse = response.json().await.context(HttpSnafu)?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(SummarizeError::EmptyReply)?;

        Ok(terminate_sentence(content.trim()))
    }
}

#[async_trait::async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str, cancel: &CancellationToken) -> SummarizeResult<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(String::new());
        };
        let text = truncate_chars(text.trim(), MAX_INPUT_CHARS);
        if text.is_empty() {
            return Ok(String::new());
        }
        debug!(target: LOG_TARGET, len = text.len(), "Requesting summary");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => CancelledSnafu.fail(),
            res = self.complete(api_key, text) => res,
        }
    }
}

fn chat_completions_url(base_url: &Url) -> Url {
    let mut url = base_url.clone();
    let path = format!("{}/chat/completions", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn terminate_sentence(s: &str) -> String {
    if s.ends_with('.') {
        s.to_owned()
    } else {
        format!("{s}.")
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}
