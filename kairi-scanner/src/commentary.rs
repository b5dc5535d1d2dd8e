//! Commentary generation via an OpenAI-compatible chat completion API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use kairi_common::config::LlmConfig;

use crate::metrics::EnrichedSymbol;
use crate::ranker::BLOCK_MARKERS;

const SYSTEM_PROMPT: &str =
    "Sen deneyimli bir borsa analistisin. Kısa, net ve veriye dayalı yorum yaparsın.";

/// Compose the ranking request for the enriched head group.
pub fn build_prompt(exchange: &str, threshold: f64, enriched: &[EnrichedSymbol]) -> String {
    let lines = enriched
        .iter()
        .map(|e| format!("- {}", e.metrics.prompt_line(&e.symbol)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"{exchange} borsasında KAIRI ≤ {threshold} (aşırı satım) ve alış sinyali veren hisseler aşağıda.

## Finansal Veriler
{lines}

## Görev
Hisseleri temel verilere göre en cazipten en az cazibe doğru sırala ve her biri için kısa yorum yaz.

## Format (kesinlikle uy)
Her hisse için:
{first} <b>SEMBOL</b>
2-3 cümlelik yorum
Puan: X/10

İlk üç hisse için sırasıyla {first} {second} {third} kullan, diğerleri için {third} kullan.
Puan 0 ile 10 arasında tam sayı olmalı."#,
        exchange = exchange,
        threshold = threshold,
        lines = lines,
        first = BLOCK_MARKERS[0],
        second = BLOCK_MARKERS[1],
        third = BLOCK_MARKERS[2],
    )
}

/// Text substituted into the pipeline when generation fails.
pub fn failure_placeholder(error: &anyhow::Error) -> String {
    format!("⚠️ Yorum üretilemedi: {}", error)
}

/// Language-model commentary for a composed prompt.
#[async_trait]
pub trait CommentaryGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generate commentary, falling back to the placeholder text on failure.
pub async fn generate_or_placeholder(generator: &dyn CommentaryGenerator, prompt: &str) -> String {
    match generator.generate(prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Commentary generation failed, using placeholder");
            failure_placeholder(&e)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    has_key: bool,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            has_key: config.api_key.is_some(),
        }
    }
}

#[async_trait]
impl CommentaryGenerator for ChatCompletionClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if !self.has_key {
            anyhow::bail!("language model API key is not configured");
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        debug!(url = %url, model = %self.model, "Requesting commentary");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to language model")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Language model API error: HTTP {} - {}", status, error_text);
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse language model response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Language model returned no content")?;

        info!(model = %self.model, chars = content.len(), "Commentary generated");
        Ok(content)
    }
}
