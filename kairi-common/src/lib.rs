//! KAIRI Common - Shared configuration, error types and logging setup.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Config, LlmConfig, MarketDataConfig, ObservabilityConfig, ScannerConfig, ServerConfig,
    StoreConfig, TelegramConfig, TieBreak,
};
pub use error::{Error, Result};
