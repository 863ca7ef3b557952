//! Shared server state: the ledger, its storage, and per-ticker write ordering.
//!
//! A mutating command for ticker `T` holds `T`'s lock across "apply to the
//! in-memory ledger" and "persist `T`", so saves for one ticker land in the
//! order the ledger applied them. Other tickers proceed concurrently. The
//! ledger's own lock is only held for the synchronous decision, never across
//! an `.await`. A failed save rolls the ticker back, so memory never runs
//! ahead of disk.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tradebot_core::{bot, command, Ledger, LedgerStorage, Reply};

use crate::telegram::Update;

/// How many handled update ids are remembered for redelivery checks.
const RECENT_UPDATES: usize = 256;

/// Where replies go. Implemented by the Telegram client; tests record them.
pub trait ReplySink: Send + Sync {
    fn send_reply<'a>(&'a self, chat_id: i64, reply: &'a Reply) -> BoxFuture<'a, Result<()>>;
}

/// One async lock per ticker, dropped again once nobody holds or waits on it.
#[derive(Debug, Default)]
pub struct TickerLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one ticker. Releasing it prunes the lock entry when idle.
pub struct TickerGuard<'a> {
    locks: &'a TickerLocks,
    ticker: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TickerLocks {
    /// Wait for exclusive access to `ticker`.
    pub async fn acquire(&self, ticker: &str) -> TickerGuard<'_> {
        let lock = self
            .locks
            .lock()
            .entry(ticker.to_string())
            .or_default()
            .clone();
        TickerGuard {
            locks: self,
            ticker: ticker.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn release(&self, ticker: &str) {
        let mut locks = self.locks.lock();
        // The map's own handle is the only one left: nobody holds or waits.
        if locks
            .get(ticker)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(ticker);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

impl Drop for TickerGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.ticker);
    }
}

/// Global server state
pub struct AppState {
    ledger: RwLock<Ledger>,
    storage: Arc<dyn LedgerStorage>,
    ticker_locks: TickerLocks,
    replies: Arc<dyn ReplySink>,
    webhook_secret: Option<String>,
    recent_updates: Mutex<VecDeque<i64>>,
}

impl AppState {
    /// Load the ledger from `storage` and wire up the reply sink.
    pub fn new(storage: Arc<dyn LedgerStorage>, replies: Arc<dyn ReplySink>) -> Result<Self> {
        let ledger = Ledger::load_from(storage.as_ref()).context("Failed to load ledger")?;
        tracing::info!(
            tickers = ledger.store().tickers().count(),
            open_positions = ledger.summarize_open().len(),
            "Ledger loaded"
        );

        Ok(Self {
            ledger: RwLock::new(ledger),
            storage,
            ticker_locks: TickerLocks::default(),
            replies,
            webhook_secret: None,
            recent_updates: Mutex::new(VecDeque::with_capacity(RECENT_UPDATES)),
        })
    }

    /// Require `X-Telegram-Bot-Api-Secret-Token` to match on webhook calls.
    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret;
        self
    }

    /// Check a webhook secret header. Always passes when no secret is configured.
    pub fn webhook_authorized(&self, presented: Option<&str>) -> bool {
        match &self.webhook_secret {
            Some(expected) => presented == Some(expected.as_str()),
            None => true,
        }
    }

    /// Number of tickers with shares held.
    pub fn open_ticker_count(&self) -> usize {
        self.ledger.read().summarize_open().len()
    }

    /// Run a chat message against the ledger.
    ///
    /// Returns `Ok(None)` for text that is not a command. Errors are only
    /// persistence failures, after which the ticker is back where it was;
    /// user mistakes become replies.
    pub async fn process_text(&self, text: &str) -> Result<Option<Reply>> {
        let command = match command::parse(text) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(None),
            Err(e) => return Ok(Some(Reply::from_error(&e))),
        };

        let answer = bot::query(&self.ledger.read(), &command);
        if let Some(reply) = answer {
            return Ok(Some(reply));
        }

        let Some(ticker) = command.ticker().map(str::to_string) else {
            return Ok(None);
        };
        let _guard = self.ticker_locks.acquire(&ticker).await;

        let (reply, change) = {
            let mut ledger = self.ledger.write();
            let before = ledger.snapshot_ticker(&ticker);
            let reply = bot::execute(&mut ledger, command, Utc::now());
            let change = reply
                .mutated_ticker
                .is_some()
                .then(|| (ledger.snapshot_ticker(&ticker), before));
            (reply, change)
        };

        if let Some((after, before)) = change {
            let storage = Arc::clone(&self.storage);
            let key = ticker.clone();
            let saved = tokio::task::spawn_blocking(move || storage.save(&key, &after))
                .await
                .context("Persistence task failed")
                .and_then(|result| result.context("Failed to persist ledger"));

            if let Err(e) = saved {
                if let Err(restore) = self.ledger.write().restore_ticker(&ticker, before) {
                    tracing::error!(%ticker, "Failed to roll back ledger: {}", restore);
                }
                return Err(e);
            }
        }

        Ok(Some(reply))
    }

    /// Handle one Telegram update end to end.
    ///
    /// A redelivered update is skipped. Failing to send the reply is logged
    /// only: the trade is already recorded and must not be applied again.
    pub async fn handle_update(&self, update: Update) -> Result<()> {
        let update_id = update.update_id;
        let Some(message) = update.message else {
            tracing::trace!(update_id, "Ignoring non-message update");
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        if self.recent_updates.lock().contains(&update_id) {
            tracing::debug!(update_id, "Skipping redelivered update");
            return Ok(());
        }

        let chat_id = message.chat.id;
        tracing::info!(update_id, chat_id, "Handling message");

        let reply = self.process_text(text).await?;
        self.remember_update(update_id);

        if let Some(reply) = reply {
            if let Err(e) = self.replies.send_reply(chat_id, &reply).await {
                tracing::warn!(update_id, chat_id, "Failed to send reply: {:#}", e);
            }
        }
        Ok(())
    }

    fn remember_update(&self, update_id: i64) {
        let mut recent = self.recent_updates.lock();
        if recent.len() == RECENT_UPDATES {
            recent.pop_front();
        }
        recent.push_back(update_id);
    }
}
