//! HTTP collaborator tests against a local mock server.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kairi_common::config::{LlmConfig, MarketDataConfig, TelegramConfig};
use kairi_scanner::commentary::{generate_or_placeholder, ChatCompletionClient, CommentaryGenerator};
use kairi_scanner::metrics::{MetricSource, YahooMetricSource};
use kairi_scanner::notification::{Notifier, TelegramNotifier};

// ============================================================================
// Market data
// ============================================================================

fn market_config(server: &MockServer) -> MarketDataConfig {
    MarketDataConfig {
        base_url: server.uri(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_yahoo_fetch_uses_bist_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/THYAO.IS"))
        .and(query_param(
            "modules",
            "summaryDetail,defaultKeyStatistics,financialData",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "quoteSummary": {
                "result": [{
                    "summaryDetail": {"trailingPE": {"raw": 4.2}},
                    "financialData": {"freeCashflow": {"raw": 1.2e9}}
                }],
                "error": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = YahooMetricSource::new(&market_config(&server));
    let bundle = source.fetch("THYAO", "BIST").await.unwrap();

    assert_eq!(bundle.trailing_pe, Some(4.2));
    assert_eq!(bundle.free_cashflow, Some(1.2e9));
    assert_eq!(bundle.forward_pe, None);
}

#[tokio::test]
async fn test_yahoo_http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/NOPE"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let source = YahooMetricSource::new(&market_config(&server));
    let err = source.fetch("NOPE", "NASDAQ").await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

// ============================================================================
// Commentary
// ============================================================================

fn llm_config(server: &MockServer, api_key: Option<&str>) -> LlmConfig {
    LlmConfig {
        base_url: server.uri(),
        api_key: api_key.map(str::to_string),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_chat_completion_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("gpt-4o-mini"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "🥇 <b>AAPL</b>\nPuan: 7/10"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionClient::new(&llm_config(&server, Some("sk-test")));
    let text = client.generate("prompt").await.unwrap();
    assert_eq!(text, "🥇 <b>AAPL</b>\nPuan: 7/10");
}

#[tokio::test]
async fn test_chat_completion_failure_becomes_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = ChatCompletionClient::new(&llm_config(&server, Some("sk-test")));
    let text = generate_or_placeholder(&client, "prompt").await;
    assert!(text.starts_with("⚠️ Yorum üretilemedi:"));
    assert!(text.contains("429"));
}

#[tokio::test]
async fn test_chat_completion_without_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ChatCompletionClient::new(&llm_config(&server, None));
    assert!(client.generate("prompt").await.is_err());
}

// ============================================================================
// Telegram
// ============================================================================

fn telegram_config(server: &MockServer) -> TelegramConfig {
    TelegramConfig {
        enabled: true,
        api_url: server.uri(),
        bot_token: Some("123:abc".into()),
        chat_id: Some("-100".into()),
    }
}

#[tokio::test]
async fn test_telegram_sends_html() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains(r#""parse_mode":"HTML""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&telegram_config(&server));
    notifier.send("<b>report</b>", true).await.unwrap();
}

#[tokio::test]
async fn test_telegram_falls_back_to_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains(r#""parse_mode":"HTML""#))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: can't parse entities: unexpected end tag"
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&telegram_config(&server));
    notifier.send("<b>broken</i>", true).await.unwrap();
}

#[tokio::test]
async fn test_telegram_other_errors_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden: bot was blocked"))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&telegram_config(&server));
    let err = notifier.send("hello", true).await.unwrap_err();
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn test_telegram_disabled_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TelegramConfig {
        enabled: false,
        ..telegram_config(&server)
    };
    TelegramNotifier::new(&config).send("hello", false).await.unwrap();
}
