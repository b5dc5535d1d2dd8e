//! Configuration management for the KAIRI scanner.
//!
//! The service reads a single JSON file at `~/.kairi/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (see below)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `KAIRI_HOST` → server.host
//! - `KAIRI_PORT` → server.port
//! - `KAIRI_LOG_LEVEL` → observability.log_level
//! - `KAIRI_SIGNAL_LOG` → store.path
//! - `KAIRI_DEFAULT_EXCHANGE` → scanner.default_exchange
//! - `OPENAI_API_KEY` → llm.api_key
//! - `TELEGRAM_BOT_TOKEN` → telegram.bot_token
//! - `TELEGRAM_CHAT_ID` → telegram.chat_id

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".kairi"),
        |dirs| dirs.home_dir().join(".kairi"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration passed explicitly into the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub market_data: MarketDataConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("KAIRI_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("KAIRI_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(level) = std::env::var("KAIRI_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(path) = std::env::var("KAIRI_SIGNAL_LOG") {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Ok(exchange) = std::env::var("KAIRI_DEFAULT_EXCHANGE") {
            self.scanner.default_exchange = exchange;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
    }

    /// Reject values the scanner cannot run with.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        if self.scanner.head_size == 0 {
            return Err(Error::Config("scanner.head_size must be at least 1".into()));
        }
        if !self.scanner.kairi_threshold.is_finite() {
            return Err(Error::Config("scanner.kairi_threshold must be finite".into()));
        }
        if self.scanner.default_exchange.trim().is_empty() {
            return Err(Error::Config("scanner.default_exchange must not be empty".into()));
        }
        Ok(())
    }

    /// Resolved path of the signal log file.
    pub fn signal_log_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| config_dir().join("signals.jsonl"))
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout for the HTTP surface, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4480
}

fn default_request_timeout() -> u64 {
    180
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Scanner
// ============================================================================

/// How blocks with equal scores are ordered after ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Equal scores keep the order in which blocks were extracted.
    #[default]
    Stable,
    /// Equal scores are ordered by display text, descending.
    TextDescending,
}

/// Filtering and ranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Exchange used when a scan request names none.
    #[serde(default = "default_exchange")]
    pub default_exchange: String,

    /// Number of matched symbols sent for enrichment and commentary.
    #[serde(default = "default_head_size")]
    pub head_size: usize,

    /// A KAIRI reading at or below this value counts as oversold.
    #[serde(default = "default_kairi_threshold")]
    pub kairi_threshold: f64,

    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_exchange: default_exchange(),
            head_size: default_head_size(),
            kairi_threshold: default_kairi_threshold(),
            tie_break: TieBreak::default(),
        }
    }
}

fn default_exchange() -> String {
    "NASDAQ".to_string()
}

fn default_head_size() -> usize {
    5
}

fn default_kairi_threshold() -> f64 {
    -20.0
}

// ============================================================================
// Signal Store
// ============================================================================

/// Signal log location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON-lines file; defaults to `~/.kairi/signals.jsonl`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ============================================================================
// Market Data
// ============================================================================

/// Market-data (Yahoo Finance) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "default_market_data_url")]
    pub base_url: String,

    #[serde(default = "default_market_data_timeout")]
    pub timeout_secs: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_data_url(),
            timeout_secs: default_market_data_timeout(),
        }
    }
}

fn default_market_data_url() -> String {
    "https://query2.finance.yahoo.com".to_string()
}

fn default_market_data_timeout() -> u64 {
    15
}

// ============================================================================
// Language Model
// ============================================================================

/// OpenAI-compatible chat completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_llm_timeout() -> u64 {
    120
}

// ============================================================================
// Telegram
// ============================================================================

/// Telegram delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_telegram_url")]
    pub api_url: String,

    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default)]
    pub chat_id: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_telegram_url(),
            bot_token: None,
            chat_id: None,
        }
    }
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}
