//! Report delivery to a Telegram chat.
//!
//! Delivery is fire-and-forget from the pipeline's point of view: the
//! pipeline logs a failed send and carries on.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use kairi_common::config::TelegramConfig;

/// Telegram rejects messages longer than 4096 characters; stay below it in bytes.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Outbound message sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send text to the configured destination. `html` selects HTML parse mode.
    async fn send(&self, text: &str, html: bool) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
}

/// Telegram Bot API `sendMessage` client.
pub struct TelegramNotifier {
    enabled: bool,
    api_url: String,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            enabled: config.enabled,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone().unwrap_or_default(),
            chat_id: config.chat_id.clone().unwrap_or_default(),
            client,
        }
    }

    /// Enabled and both token and chat id present.
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }

    async fn post(
        &self,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(reqwest::StatusCode, String)> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        let response = self.client.post(self.send_url()).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// Send one chunk, dropping to plain text if Telegram rejects the HTML.
    async fn send_chunk(&self, chunk: &str, html: bool) -> Result<()> {
        let (status, body) = self.post(chunk, html.then_some("HTML")).await?;
        if status.is_success() {
            return Ok(());
        }

        // Telegram answers "Bad Request: can't parse entities" for broken HTML
        if html && status.as_u16() == 400 && body.contains("parse entities") {
            tracing::warn!(error = %body, "Telegram HTML parsing failed, resending as plain text");

            let (plain_status, plain_body) = self.post(chunk, None).await?;
            if plain_status.is_success() {
                return Ok(());
            }
            anyhow::bail!("Telegram sendMessage failed: HTTP {} {}", plain_status, plain_body);
        }

        anyhow::bail!("Telegram sendMessage failed: HTTP {} {}", status, body)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, html: bool) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!("Telegram delivery disabled, skipping");
            return Ok(());
        }

        let chunks = split_message(text, MAX_MESSAGE_LEN);
        for chunk in &chunks {
            self.send_chunk(chunk, html).await?;
        }

        tracing::info!(
            chat_id = %self.chat_id,
            chunks = chunks.len(),
            "Report delivered to Telegram"
        );
        Ok(())
    }
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Split a message into chunks of at most `max_len` bytes, preferring
/// paragraph, then line, then word boundaries.
pub fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let limit = floor_char_boundary(remaining, max_len);
        let window = &remaining[..limit];
        let split_pos = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .unwrap_or(limit);
        // A lone multi-byte char wider than max_len still has to move forward.
        let split_pos = if split_pos == 0 {
            remaining.chars().next().map_or(remaining.len(), char::len_utf8)
        } else {
            split_pos
        };

        chunks.push(remaining[..split_pos].to_string());
        remaining = remaining[split_pos..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_credentials() {
        let notifier = TelegramNotifier::new(&TelegramConfig::default());
        assert!(!notifier.is_enabled());
    }

    #[test]
    fn test_enabled_flag_respected() {
        let config = TelegramConfig {
            enabled: false,
            bot_token: Some("t".into()),
            chat_id: Some("1".into()),
            ..Default::default()
        };
        assert!(!TelegramNotifier::new(&config).is_enabled());
    }

    #[test]
    fn test_request_serialization() {
        let request = SendMessageRequest {
            chat_id: "-100",
            text: "<b>x</b>",
            parse_mode: Some("HTML"),
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["parse_mode"], "HTML");

        let plain = SendMessageRequest {
            parse_mode: None,
            ..request
        };
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn test_short_message_is_single_chunk() {
        assert_eq!(split_message("kısa", 100), vec!["kısa".to_string()]);
    }

    #[test]
    fn test_split_prefers_paragraphs() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "ş".repeat(50);
        let chunks = split_message(&text, 15);
        assert!(chunks.iter().all(|c| c.len() <= 15));
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn test_disabled_send_is_noop() {
        let notifier = TelegramNotifier::new(&TelegramConfig::default());
        assert!(notifier.send("hello", true).await.is_ok());
    }
}
