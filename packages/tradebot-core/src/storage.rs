//! Ledger persistence.
//!
//! The ledger only needs per-ticker load/save; [`LedgerStorage`] is that
//! capability. [`JsonFileStorage`] keeps every ticker in one JSON document and
//! replaces it atomically on each save.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Lot;
use crate::Result;

/// Per-ticker lot persistence.
pub trait LedgerStorage: Send + Sync {
    /// Tickers that have stored lots.
    fn tickers(&self) -> Result<Vec<String>>;

    /// Lots of one ticker in buy order; empty if unknown.
    fn load(&self, ticker: &str) -> Result<Vec<Lot>>;

    /// Replace the stored lots of one ticker.
    fn save(&self, ticker: &str, lots: &[Lot]) -> Result<()>;
}

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    books: Mutex<BTreeMap<String, Vec<Lot>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStorage for MemoryStorage {
    fn tickers(&self) -> Result<Vec<String>> {
        Ok(self.books.lock().keys().cloned().collect())
    }

    fn load(&self, ticker: &str) -> Result<Vec<Lot>> {
        Ok(self.books.lock().get(ticker).cloned().unwrap_or_default())
    }

    fn save(&self, ticker: &str, lots: &[Lot]) -> Result<()> {
        self.books.lock().insert(ticker.to_string(), lots.to_vec());
        Ok(())
    }
}

/// On-disk document written by [`JsonFileStorage`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    tickers: BTreeMap<String, Vec<Lot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// All tickers in a single JSON file.
#[derive(Debug)]
pub struct JsonFileStorage {
    /// Path to the ledger JSON file
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Storage at the default path.
    ///
    /// Default path: `~/.tradebot/ledger.json`
    /// Can be overridden with `TRADEBOT_LEDGER_FILE` environment variable.
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    /// Storage at a custom path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the default ledger file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("TRADEBOT_LEDGER_FILE") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".tradebot/ledger.json"))
            .unwrap_or_else(|| PathBuf::from("ledger.json"))
    }

    /// Get the current path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<LedgerFile> {
        if !self.path.exists() {
            return Ok(LedgerFile::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let data: serde_json::Value = serde_json::from_str(&content)?;

        // Flat format: a bare list of lots
        if data.is_array() {
            let lots: Vec<Lot> = serde_json::from_value(data)?;
            let mut tickers: BTreeMap<String, Vec<Lot>> = BTreeMap::new();
            for lot in lots {
                tickers.entry(lot.ticker.clone()).or_default().push(lot);
            }
            return Ok(LedgerFile {
                tickers,
                ..Default::default()
            });
        }

        Ok(serde_json::from_value(data)?)
    }

    fn write_file(&self, file: &LedgerFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(file)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Default for JsonFileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStorage for JsonFileStorage {
    fn tickers(&self) -> Result<Vec<String>> {
        Ok(self.read_file()?.tickers.into_keys().collect())
    }

    fn load(&self, ticker: &str) -> Result<Vec<Lot>> {
        Ok(self
            .read_file()?
            .tickers
            .remove(ticker)
            .unwrap_or_default())
    }

    fn save(&self, ticker: &str, lots: &[Lot]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = self.read_file()?;

        let now = Utc::now();
        if file.created_at.is_none() {
            file.created_at = Some(now);
        }
        file.updated_at = Some(now);

        if lots.is_empty() {
            file.tickers.remove(ticker);
        } else {
            file.tickers.insert(ticker.to_string(), lots.to_vec());
        }

        self.write_file(&file)?;
        tracing::trace!(path = %self.path.display(), %ticker, lots = lots.len(), "Saved ledger");
        Ok(())
    }
}
