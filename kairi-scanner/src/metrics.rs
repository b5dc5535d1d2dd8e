//! Financial metric enrichment for head-group symbols.
//!
//! Metrics come from the Yahoo Finance `quoteSummary` endpoint. A failed
//! lookup drops the symbol from the enriched list only; it stays in the head
//! group and the report.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use kairi_common::config::MarketDataConfig;

/// Fundamentals used in the commentary prompt. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricBundle {
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub free_cashflow: Option<f64>,
}

impl MetricBundle {
    /// One prompt line for a symbol; missing values read `N/A`.
    pub fn prompt_line(&self, symbol: &str) -> String {
        format!(
            "{}: F/K={}, İleri F/K={}, EPS={}, Gelir Büyümesi={}, Borç/Özsermaye={}, Serbest Nakit Akışı={}",
            symbol,
            fmt_ratio(self.trailing_pe),
            fmt_ratio(self.forward_pe),
            fmt_ratio(self.trailing_eps),
            fmt_percent(self.revenue_growth),
            fmt_ratio(self.debt_to_equity),
            fmt_amount(self.free_cashflow),
        )
    }
}

fn fmt_ratio(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

fn fmt_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v * 100.0))
        .unwrap_or_else(|| "N/A".to_string())
}

fn fmt_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.abs() >= 1e9 => format!("{:.2}B", v / 1e9),
        Some(v) if v.abs() >= 1e6 => format!("{:.2}M", v / 1e6),
        Some(v) => format!("{:.0}", v),
        None => "N/A".to_string(),
    }
}

/// A head-group symbol with its metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedSymbol {
    pub symbol: String,
    pub metrics: MetricBundle,
}

/// Market-data lookup for one symbol.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch(&self, symbol: &str, exchange: &str) -> Result<MetricBundle>;
}

/// Look up every head symbol in order, skipping failures.
pub async fn enrich(
    source: &dyn MetricSource,
    head: &[String],
    exchange: &str,
) -> Vec<EnrichedSymbol> {
    let mut enriched = Vec::with_capacity(head.len());

    for symbol in head {
        match source.fetch(symbol, exchange).await {
            Ok(metrics) => enriched.push(EnrichedSymbol {
                symbol: symbol.clone(),
                metrics,
            }),
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    error = %e,
                    "Metric lookup failed, symbol left out of commentary"
                );
            }
        }
    }

    debug!(
        head = head.len(),
        enriched = enriched.len(),
        "Enrichment finished"
    );
    enriched
}

/// Yahoo ticker for a symbol on an exchange.
///
/// Borsa Istanbul listings carry the `.IS` suffix on Yahoo.
pub fn yahoo_ticker(symbol: &str, exchange: &str) -> String {
    if exchange.eq_ignore_ascii_case("BIST") && !symbol.contains('.') {
        format!("{}.IS", symbol)
    } else {
        symbol.to_string()
    }
}

/// Yahoo Finance `quoteSummary` client.
pub struct YahooMetricSource {
    base_url: String,
    client: reqwest::Client,
}

impl YahooMetricSource {
    const MODULES: &'static str = "summaryDetail,defaultKeyStatistics,financialData";

    pub fn new(config: &MarketDataConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("kairi-scanner/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// `quoteSummary` URL with the ticker as one percent-encoded path segment.
    fn summary_url(&self, ticker: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid market data base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Market data base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v10", "finance", "quoteSummary"])
            .push(ticker);
        Ok(url)
    }

    /// Pull the metric bundle out of a `quoteSummary` response body.
    fn parse_summary(body: &serde_json::Value) -> Result<MetricBundle> {
        let summary = body
            .get("quoteSummary")
            .context("Response has no quoteSummary")?;

        if let Some(err) = summary.get("error").filter(|e| !e.is_null()) {
            let description = err
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("unknown error");
            anyhow::bail!("Yahoo error: {}", description);
        }

        let result = summary
            .get("result")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .context("quoteSummary result is empty")?;

        let raw = |module: &str, key: &str| -> Option<f64> {
            result.get(module)?.get(key)?.get("raw")?.as_f64()
        };

        Ok(MetricBundle {
            trailing_pe: raw("summaryDetail", "trailingPE"),
            forward_pe: raw("summaryDetail", "forwardPE")
                .or_else(|| raw("defaultKeyStatistics", "forwardPE")),
            trailing_eps: raw("defaultKeyStatistics", "trailingEps"),
            revenue_growth: raw("financialData", "revenueGrowth"),
            debt_to_equity: raw("financialData", "debtToEquity"),
            free_cashflow: raw("financialData", "freeCashflow"),
        })
    }
}

#[async_trait]
impl MetricSource for YahooMetricSource {
    async fn fetch(&self, symbol: &str, exchange: &str) -> Result<MetricBundle> {
        let ticker = yahoo_ticker(symbol, exchange);
        let url = self.summary_url(&ticker)?;

        debug!(url = %url, "Fetching metrics");

        let response = self
            .client
            .get(url)
            .query(&[("modules", Self::MODULES)])
            .send()
            .await
            .with_context(|| format!("Failed to reach market data for {}", ticker))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Market data HTTP {} for {}: {}", status, ticker, error_text);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse market data response")?;

        Self::parse_summary(&body)
    }
}
