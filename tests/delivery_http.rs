// tests/delivery_http.rs
//
// Telegram delivery and the Claude generator against a local mock server.

use std::time::Duration;

use gamefi_radar::ai::{ClaudeProvider, TextGenerator};
use gamefi_radar::config::ai::AiConfig;
use gamefi_radar::notify::{DeliveryChannel, TelegramChannel};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn channel(server: &MockServer) -> TelegramChannel {
    TelegramChannel::new("123:abc".into(), "@gamefi_br".into())
        .unwrap()
        .with_api_base(&server.uri())
        .with_retries(3)
        .with_backoff(Duration::from_millis(10))
}

#[tokio::test]
async fn telegram_sends_html_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "@gamefi_br",
            "text": "<b>Oi</b>",
            "parse_mode": "HTML",
            "disable_web_page_preview": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    channel(&server).send("<b>Oi</b>").await.unwrap();
}

#[tokio::test]
async fn telegram_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    channel(&server).send("x").await.unwrap();
}

#[tokio::test]
async fn telegram_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = channel(&server).send("x").await.unwrap_err();
    assert!(err.to_string().contains("chat not found"));
}

fn claude_config(server: &MockServer) -> AiConfig {
    AiConfig {
        api_key: "sk-test".into(),
        base_url: server.uri(),
        timeout_secs: 5,
        ..AiConfig::default()
    }
}

#[tokio::test]
async fn claude_text_blocks_are_joined_and_cleaned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"system": "sys"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "<thinking>rascunho</thinking>**Manchete**\n\n\n\n"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "Corpo https://decrypt.co/1"}
            ]
        })))
        .mount(&server)
        .await;

    let claude = ClaudeProvider::from_config(&claude_config(&server)).unwrap();
    let out = claude.generate("prompt", "sys").await.unwrap();
    assert_eq!(out, "**Manchete**\n\nCorpo https://decrypt.co/1");
}

#[tokio::test]
async fn claude_failure_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let claude = ClaudeProvider::from_config(&claude_config(&server)).unwrap();
    assert!(claude.generate("prompt", "sys").await.is_none());
}
