//! Telegram Bot API contract tests
//!
//! Run the publisher against a mock Bot API and check the request shape,
//! the caption handling and the retry behaviour per status code.

use ai_post_bot::content::{GeneratedContent, GeneratedImage};
use ai_post_bot::publisher::{Publisher, CAPTION_LIMIT, CONTINUATION_MARKER};
use ai_post_bot::retry::RetryPolicy;
use ai_post_bot::telegram::TelegramChannel;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:abc";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(5),
        backoff_factor: 2,
    }
}

fn publisher(server: &MockServer) -> Publisher {
    let channel = TelegramChannel::new(&server.uri(), TOKEN, "@ai_posts", Duration::from_secs(5))
        .expect("client should build");
    Publisher::new(Arc::new(channel), fast_retry())
}

fn post(text: String, with_image: bool) -> GeneratedContent {
    GeneratedContent {
        text,
        image: with_image.then(|| GeneratedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".to_string(),
            file_name: "image.png".to_string(),
        }),
    }
}

fn ok_body() -> serde_json::Value {
    serde_json::json!({"ok": true, "result": {}})
}

#[tokio::test]
async fn text_post_uses_send_message_form() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .and(body_string_contains("chat_id=%40ai_posts"))
        .and(body_string_contains("text=hello+channel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    assert!(publisher(&server).publish(&post("hello channel".to_string(), false)).await);
}

#[tokio::test]
async fn short_post_is_a_single_multipart_photo() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendPhoto", TOKEN)))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"caption\""))
        .and(body_string_contains("name=\"photo\"; filename=\"image.png\""))
        .and(body_string_contains("short caption"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(0)
        .mount(&server)
        .await;

    assert!(publisher(&server).publish(&post("short caption".to_string(), true)).await);
}

#[tokio::test]
async fn long_post_sends_photo_then_full_text() {
    let server = MockServer::start().await;
    let text = "x".repeat(2000);
    let caption = format!(
        "{}{}",
        "x".repeat(CAPTION_LIMIT - CONTINUATION_MARKER.chars().count()),
        CONTINUATION_MARKER
    );

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendPhoto", TOKEN)))
        .and(body_string_contains(caption.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .and(body_string_contains(format!("text={}", text).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    assert!(publisher(&server).publish(&post(text, true)).await);
}

#[tokio::test]
async fn server_errors_are_retried_up_to_the_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    assert!(!publisher(&server).publish(&post("hello".to_string(), false)).await);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendPhoto", TOKEN)))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 404,
            "description": "Not Found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!publisher(&server).publish(&post("hello".to_string(), true)).await);
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    assert!(publisher(&server).publish(&post("hello".to_string(), false)).await);
}

#[tokio::test]
async fn unreachable_api_reports_failure() {
    // Nothing listens on the discard port
    let channel = TelegramChannel::new("http://127.0.0.1:9", TOKEN, "@ai_posts", Duration::from_secs(1))
        .expect("client should build");
    let publisher = Publisher::new(Arc::new(channel), fast_retry());

    assert!(!publisher.publish(&post("hello".to_string(), false)).await);
}
