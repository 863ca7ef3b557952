//! Per-ticker lot storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{validate_price, Lot, LotId};
use crate::{Error, Result};

/// Ordered lots per ticker. Insertion order is buy order and is never changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LotStore {
    books: BTreeMap<String, Vec<Lot>>,
    next_id: u64,
}

/// Open lots of one ticker, oldest first.
///
/// Borrows the store, so it cannot observe a sell that happens after it was
/// created. Clone it to walk the same snapshot again.
#[derive(Debug, Clone)]
pub struct OpenLots<'a> {
    inner: std::slice::Iter<'a, Lot>,
}

impl<'a> Iterator for OpenLots<'a> {
    type Item = &'a Lot;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().find(|lot| lot.is_open())
    }
}

impl LotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new open lot to the ticker's sequence.
    pub fn add_lot(
        &mut self,
        ticker: &str,
        buy_price: f64,
        quantity: f64,
        opened_at: DateTime<Utc>,
    ) -> Result<LotId> {
        if ticker.is_empty() {
            return Err(Error::InvalidInput("Ticker must not be empty".to_string()));
        }
        validate_price(buy_price)?;
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(Error::InvalidInput(
                "Quantity must be greater than 0".to_string(),
            ));
        }

        self.next_id += 1;
        let id = LotId(self.next_id);
        self.books
            .entry(ticker.to_string())
            .or_default()
            .push(Lot::new(id, ticker, buy_price, quantity, opened_at));
        Ok(id)
    }

    /// Open lots for a ticker in buy order.
    pub fn open_lots_for(&self, ticker: &str) -> OpenLots<'_> {
        OpenLots {
            inner: self.lots_for(ticker).iter(),
        }
    }

    /// Every closed lot of every ticker. Order is unspecified.
    pub fn closed_lots(&self) -> impl Iterator<Item = &Lot> + '_ {
        self.all_lots().filter(|lot| lot.is_closed())
    }

    /// Shares currently held for a ticker; `0.0` if the ticker is unknown.
    pub fn total_open_quantity(&self, ticker: &str) -> f64 {
        self.open_lots_for(ticker).map(|lot| lot.open_quantity).sum()
    }

    /// All lots of a ticker, open and closed, in buy order.
    pub fn lots_for(&self, ticker: &str) -> &[Lot] {
        self.books.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tickers that have ever been bought, sorted.
    pub fn tickers(&self) -> impl Iterator<Item = &str> + '_ {
        self.books.keys().map(String::as_str)
    }

    /// All lots of all tickers.
    pub fn all_lots(&self) -> impl Iterator<Item = &Lot> + '_ {
        self.books.values().flatten()
    }

    /// Find a lot by identity.
    pub fn lot(&self, id: LotId) -> Option<&Lot> {
        self.all_lots().find(|lot| lot.id == id)
    }

    /// Whether the store holds no lots at all.
    pub fn is_empty(&self) -> bool {
        self.books.values().all(Vec::is_empty)
    }

    /// Replace a ticker's lots with ones loaded from storage.
    ///
    /// Lots must belong to `ticker` and be internally consistent. Lot ids
    /// issued afterwards continue past the highest id seen.
    pub fn replace_ticker(&mut self, ticker: &str, lots: Vec<Lot>) -> Result<()> {
        for lot in &lots {
            if lot.ticker != ticker {
                return Err(Error::InvalidInput(format!(
                    "Lot {} belongs to {}, not {}",
                    lot.id, lot.ticker, ticker
                )));
            }
            let consistent = lot.buy_price > 0.0
                && lot.open_quantity >= 0.0
                && lot.open_quantity <= lot.quantity
                && lot.closed_at.is_some() == (lot.open_quantity == 0.0);
            if !consistent {
                return Err(Error::InvalidInput(format!(
                    "Lot {} for {} is inconsistent",
                    lot.id, ticker
                )));
            }
        }

        if let Some(max) = lots.iter().map(|lot| lot.id.0).max() {
            self.next_id = self.next_id.max(max);
        }
        if lots.is_empty() {
            self.books.remove(ticker);
        } else {
            self.books.insert(ticker.to_string(), lots);
        }
        Ok(())
    }

    /// Open lots of a ticker for in-place consumption, oldest first.
    pub(crate) fn open_lots_mut(&mut self, ticker: &str) -> impl Iterator<Item = &mut Lot> + '_ {
        self.books
            .get_mut(ticker)
            .into_iter()
            .flatten()
            .filter(|lot| lot.is_open())
    }
}
