//! KAIRI Scanner Library
//!
//! Filters a log of charting signals for symbols that are both oversold
//! (KAIRI reading at or below a threshold) and flagged with a buy pattern,
//! asks a language model to rank the first few with fundamentals attached,
//! re-orders the answer by its embedded scores and delivers the report to
//! Telegram.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                  kairi-scanner (Rust Service)                     │
//! │                           :4480                                   │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  signal log → matcher → partition → metrics → LLM commentary      │
//! │                                   → ranker → report → Telegram    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod commentary;
pub mod matcher;
pub mod metrics;
pub mod notification;
pub mod partition;
pub mod pipeline;
pub mod ranker;
pub mod report;
pub mod routes;
pub mod signal;
pub mod store;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use kairi_common::config::Config;

use crate::commentary::ChatCompletionClient;
use crate::metrics::YahooMetricSource;
use crate::notification::TelegramNotifier;
use crate::pipeline::ScanPipeline;
use crate::store::{JsonlSignalStore, SignalStore};

/// Webhook bodies are single small records.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Scanner service state
pub struct ScannerState {
    /// Configuration
    pub config: Config,
    /// Signal log shared by the webhook and the pipeline
    pub store: Arc<dyn SignalStore>,
    /// Scan pipeline
    pub pipeline: ScanPipeline,
}

impl ScannerState {
    /// Create state wired to the real collaborators.
    pub fn new(config: Config) -> Self {
        let store: Arc<dyn SignalStore> =
            Arc::new(JsonlSignalStore::new(config.signal_log_path()));

        let pipeline = ScanPipeline::new(
            config.scanner.clone(),
            Arc::clone(&store),
            Arc::new(YahooMetricSource::new(&config.market_data)),
            Arc::new(ChatCompletionClient::new(&config.llm)),
            Arc::new(TelegramNotifier::new(&config.telegram)),
        );

        Self {
            config,
            store,
            pipeline,
        }
    }

    /// Create state around an already built pipeline.
    pub fn with_pipeline(
        config: Config,
        store: Arc<dyn SignalStore>,
        pipeline: ScanPipeline,
    ) -> Self {
        Self {
            config,
            store,
            pipeline,
        }
    }
}

/// Build the HTTP router.
///
/// The scan route has no request timeout: a pass waits on its collaborators'
/// own timeouts and must finish delivery.
pub fn build_router(state: Arc<ScannerState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let bounded: Router<Arc<ScannerState>> = Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/matches", get(routes::matches))
        .route("/webhook", post(routes::webhook))
        .layer(TimeoutLayer::new(timeout));

    Router::new()
        .route("/api/v1/scan", get(routes::scan).post(routes::scan))
        .merge(bounded)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main scanner service
pub struct ScannerService {
    state: Arc<ScannerState>,
}

impl ScannerService {
    /// Create a new scanner service
    pub fn new(config: Config) -> Self {
        let state = Arc::new(ScannerState::new(config));
        Self { state }
    }

    /// Start the HTTP server
    pub async fn start(self) -> Result<()> {
        let server = &self.state.config.server;
        let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;

        tracing::info!(
            address = %addr,
            signal_log = %self.state.config.signal_log_path().display(),
            default_exchange = %self.state.config.scanner.default_exchange,
            "Starting HTTP server"
        );

        let app = build_router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
