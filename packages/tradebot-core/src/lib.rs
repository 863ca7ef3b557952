//! TradeBot Core - FIFO position ledger for chat-driven trade journaling.
//!
//! This crate provides everything TradeBot needs short of the chat transport:
//!
//! - **Ledger**: open lots per ticker, FIFO consumption, realized profit
//! - **Storage**: pluggable persistence (in-memory or JSON file)
//! - **Commands**: parsing of `/buy`, `/sell`, `/profit`, `/trades` text
//! - **Reports**: human-readable confirmation and summary messages
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use tradebot_core::{Ledger, SizeSpec};
//!
//! let mut ledger = Ledger::new();
//! ledger.record_buy("AAPL", 100.0, SizeSpec::Shares(10.0), Utc::now()).unwrap();
//! ledger.record_buy("AAPL", 110.0, SizeSpec::Shares(10.0), Utc::now()).unwrap();
//!
//! let receipt = ledger
//!     .record_sell("AAPL", 120.0, Some(SizeSpec::Shares(15.0)), Utc::now())
//!     .unwrap();
//! assert_eq!(receipt.fills.len(), 2);
//! assert!((receipt.profit - 250.0).abs() < 1e-9);
//! ```

pub mod bot;
pub mod command;
pub mod config;
pub mod ledger;
pub mod report;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use types::{
    normalize_ticker, ApiResponse, BuyReceipt, ClosedTrade, Fill, Lot, LotId, OpenLotDetail,
    OpenPosition, ProfitSummary, SellAttribution, SellReceipt, SizeSpec, TickerProfit,
};

// Re-export main functionality
pub use bot::{execute, handle_text, Reply};
pub use command::{parse, Command};
pub use config::{Config, ServerConfig, TelegramConfig};
pub use ledger::{Ledger, LotStore, QUANTITY_EPSILON};
pub use storage::{JsonFileStorage, LedgerStorage, MemoryStorage};

/// Error types for tradebot-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No open position found for {0}")]
    NoOpenPosition(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(String),
}

/// Result type for tradebot-core operations.
pub type Result<T> = std::result::Result<T, Error>;
