//! One complete scan pass: log → match → partition → enrich → commentary →
//! rank → report → delivery.
//!
//! Every pass rebuilds its aggregates from the log; nothing is shared
//! between passes. Collaborator failures degrade to text in the report and
//! never abort the pass. Only an unreadable signal log is an error.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use kairi_common::config::ScannerConfig;
use kairi_common::logging::generate_scan_id;
use kairi_common::Result;

use crate::commentary::{build_prompt, generate_or_placeholder, CommentaryGenerator};
use crate::matcher::{MatchResult, SignalMatcher};
use crate::metrics::{enrich, MetricSource};
use crate::notification::Notifier;
use crate::partition::Partition;
use crate::ranker::{RankedBlock, ResponseRanker};
use crate::report;
use crate::store::SignalStore;

/// Match and partition results without any external calls.
#[derive(Debug, Clone, Serialize)]
pub struct ScanPreview {
    pub exchange: String,
    pub matched: MatchResult,
    pub head: Vec<String>,
    pub overflow: Vec<String>,
}

/// Terminal state of a scan pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    NoMatch {
        exchange: String,
        notice: String,
    },
    Delivered {
        exchange: String,
        matched: MatchResult,
        head: Vec<String>,
        overflow: Vec<String>,
        enriched: usize,
        ranked: Vec<RankedBlock>,
        report: String,
    },
}

impl ScanOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// The scan pipeline and its collaborators.
#[derive(Clone)]
pub struct ScanPipeline {
    settings: ScannerConfig,
    store: Arc<dyn SignalStore>,
    metrics: Arc<dyn MetricSource>,
    commentary: Arc<dyn CommentaryGenerator>,
    notifier: Arc<dyn Notifier>,
}

impl ScanPipeline {
    pub fn new(
        settings: ScannerConfig,
        store: Arc<dyn SignalStore>,
        metrics: Arc<dyn MetricSource>,
        commentary: Arc<dyn CommentaryGenerator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            store,
            metrics,
            commentary,
            notifier,
        }
    }

    /// Exchange to scan: the requested one, or the configured default.
    pub fn resolve_exchange(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(self.settings.default_exchange.as_str())
            .to_string()
    }

    /// Parse, match and partition the current log.
    pub async fn preview(&self, exchange: &str) -> Result<ScanPreview> {
        let observations = self.store.load().await?;
        let matched = SignalMatcher::new(self.settings.kairi_threshold)
            .match_symbols(&observations, exchange);
        let partition = Partition::split(matched.clone(), self.settings.head_size);

        Ok(ScanPreview {
            exchange: exchange.to_string(),
            matched,
            head: partition.head,
            overflow: partition.overflow,
        })
    }

    /// Run a full pass and deliver the result.
    pub async fn run(&self, exchange: &str) -> Result<ScanOutcome> {
        let scan_id = generate_scan_id();
        let span = tracing::info_span!("scan", scan_id = %scan_id, exchange = %exchange);
        self.run_inner(exchange).instrument(span).await
    }

    async fn run_inner(&self, exchange: &str) -> Result<ScanOutcome> {
        let preview = self.preview(exchange).await?;

        if preview.matched.is_empty() {
            let notice = report::no_match_notice(exchange, self.settings.kairi_threshold);
            info!("No symbols matched");
            self.deliver(&notice, false).await;
            return Ok(ScanOutcome::NoMatch {
                exchange: exchange.to_string(),
                notice,
            });
        }

        info!(
            matched = preview.matched.len(),
            head = preview.head.len(),
            overflow = preview.overflow.len(),
            "Symbols matched"
        );

        let enriched = enrich(self.metrics.as_ref(), &preview.head, exchange).await;
        let prompt = build_prompt(exchange, self.settings.kairi_threshold, &enriched);
        let commentary = generate_or_placeholder(self.commentary.as_ref(), &prompt).await;

        let ranked = ResponseRanker::new(self.settings.tie_break).rank(&commentary);
        if ranked.is_empty() {
            warn!("Commentary contained no recognizable symbol blocks");
        }

        let text = report::assemble(exchange, &ranked, &preview.overflow);
        self.deliver(&text, true).await;

        Ok(ScanOutcome::Delivered {
            exchange: exchange.to_string(),
            matched: preview.matched,
            head: preview.head,
            overflow: preview.overflow,
            enriched: enriched.len(),
            ranked,
            report: text,
        })
    }

    async fn deliver(&self, text: &str, html: bool) {
        if let Err(e) = self.notifier.send(text, html).await {
            warn!(error = %e, "Failed to deliver report");
        }
    }
}
