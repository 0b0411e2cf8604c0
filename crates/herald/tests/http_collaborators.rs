use std::time::Duration;

use herald::publisher::{PublishError, Publisher, TelegramPublisher};
use herald::summarizer::{OpenAiSummarizer, Summarizer};
use herald_core::error::BoxedErrorResult;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    herald::build_http_client(Duration::from_secs(30)).expect("client builds")
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn telegram_publisher_sends_markdown_v2() -> BoxedErrorResult<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:secret/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "@news",
            "text": "*Hi*",
            "parse_mode": "MarkdownV2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = TelegramPublisher::new(client(), &Url::parse(&server.uri())?, "123:secret");
    publisher
        .publish("@news", "*Hi*", &CancellationToken::new())
        .await?;

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn telegram_rejection_is_an_error() -> BoxedErrorResult<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: can't parse entities",
        })))
        .mount(&server)
        .await;

    let publisher = TelegramPublisher::new(client(), &Url::parse(&server.uri())?, "123:secret");
    let res = publisher
        .publish("@news", "*unbalanced", &CancellationToken::new())
        .await;

    match res {
        Err(PublishError::Rejected { description, .. }) => {
            assert_eq!(description, "Bad Request: can't parse entities");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn openai_summarizer_requests_completion() -> BoxedErrorResult<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 256,
            "messages": [
                { "role": "system", "content": "Be brief." },
                { "role": "user", "content": "Article text" },
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  A short summary \n" } }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summarizer = OpenAiSummarizer::builder()
        .client(client())
        .api_key("sk-test".to_owned())
        .base_url(Url::parse(&format!("{}/v1", server.uri()))?)
        .prompt("Be brief.")
        .build();

    let summary = summarizer
        .summarize("Article text", &CancellationToken::new())
        .await?;
    assert_eq!(summary, "A short summary.");

    // Empty input never reaches the API
    assert_eq!(
        summarizer
            .summarize("  \n", &CancellationToken::new())
            .await?,
        ""
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn summarizer_cancellation_is_prompt() -> BoxedErrorResult<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "choices": [] }))
                .set_delay(Duration::from_secs(60)),
        )
        .mount(&server)
        .await;

    let summarizer = OpenAiSummarizer::builder()
        .client(client())
        .api_key("sk-test".to_owned())
        .base_url(Url::parse(&server.uri())?)
        .build();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let res = tokio::time::timeout(
        Duration::from_secs(5),
        summarizer.summarize("Article text", &cancel),
    )
    .await
    .expect("returns promptly");
    assert!(matches!(
        res,
        Err(herald::summarizer::SummarizeError::Cancelled)
    ));

    Ok(())
}
