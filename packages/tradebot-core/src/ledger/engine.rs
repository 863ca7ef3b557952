//! Buy and sell operations over the lot store.

use chrono::{DateTime, Utc};

use super::store::LotStore;
use super::QUANTITY_EPSILON;
use crate::storage::LedgerStorage;
use crate::types::{
    normalize_ticker, validate_price, BuyReceipt, Fill, Lot, SellReceipt, SizeSpec,
};
use crate::{Error, Result};

/// FIFO position ledger.
///
/// Owns its [`LotStore`]; every mutation goes through `&mut self`, so one
/// owner always sees a consistent set of lots.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    store: LotStore,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing store.
    pub fn with_store(store: LotStore) -> Self {
        Self { store }
    }

    /// Build a ledger from every ticker in `storage`.
    pub fn load_from<S: LedgerStorage + ?Sized>(storage: &S) -> Result<Self> {
        let mut store = LotStore::new();
        for ticker in storage.tickers()? {
            let lots = storage.load(&ticker)?;
            store.replace_ticker(&ticker, lots)?;
        }
        tracing::debug!(lots = store.all_lots().count(), "Loaded ledger");
        Ok(Self { store })
    }

    /// Write one ticker's lots to `storage`.
    pub fn persist_ticker<S: LedgerStorage + ?Sized>(&self, storage: &S, ticker: &str) -> Result<()> {
        storage.save(ticker, self.store.lots_for(ticker))
    }

    /// Write every ticker's lots to `storage`.
    pub fn persist_all<S: LedgerStorage + ?Sized>(&self, storage: &S) -> Result<()> {
        for ticker in self.store.tickers() {
            storage.save(ticker, self.store.lots_for(ticker))?;
        }
        Ok(())
    }

    /// Read access to the underlying lots.
    pub fn store(&self) -> &LotStore {
        &self.store
    }

    /// Copy of one ticker's lots, for persisting outside a lock.
    pub fn snapshot_ticker(&self, ticker: &str) -> Vec<Lot> {
        self.store.lots_for(ticker).to_vec()
    }

    /// Put back lots taken with [`Ledger::snapshot_ticker`], undoing any
    /// trades on that ticker since.
    pub fn restore_ticker(&mut self, ticker: &str, lots: Vec<Lot>) -> Result<()> {
        self.store.replace_ticker(ticker, lots)
    }

    /// Shares currently held for a ticker.
    pub fn held(&self, ticker: &str) -> f64 {
        self.store.total_open_quantity(&ticker.trim().to_uppercase())
    }

    /// Record a purchase as a new lot.
    pub fn record_buy(
        &mut self,
        ticker: &str,
        price: f64,
        size: SizeSpec,
        at: DateTime<Utc>,
    ) -> Result<BuyReceipt> {
        let ticker = normalize_ticker(ticker)?;
        let shares = size.resolve(price)?;
        let lot_id = self.store.add_lot(&ticker, price, shares, at)?;

        tracing::debug!(%ticker, %lot_id, price, shares, "Recorded buy");

        Ok(BuyReceipt {
            lot_id,
            ticker,
            price,
            shares,
            cost: price * shares,
            opened_at: at,
        })
    }

    /// Sell shares against the oldest open lots first.
    ///
    /// `size == None` sells the whole position. When fewer shares are held
    /// than requested, everything held is sold and the remainder is reported
    /// as `shortfall`; the executed part is kept.
    pub fn record_sell(
        &mut self,
        ticker: &str,
        price: f64,
        size: Option<SizeSpec>,
        at: DateTime<Utc>,
    ) -> Result<SellReceipt> {
        let ticker = normalize_ticker(ticker)?;
        validate_price(price)?;
        let requested = size.map(|s| s.resolve(price)).transpose()?;

        let held = self.store.total_open_quantity(&ticker);
        if held <= 0.0 {
            return Err(Error::NoOpenPosition(ticker));
        }

        let target = requested.unwrap_or(held);
        let mut remaining = target;
        let mut fills = Vec::new();

        for lot in self.store.open_lots_mut(&ticker) {
            let consumed = match requested {
                None => lot.open_quantity,
                Some(_) if remaining <= QUANTITY_EPSILON => break,
                // Take the whole lot when only dust would be left behind.
                Some(_) if lot.open_quantity - remaining <= QUANTITY_EPSILON => lot.open_quantity,
                Some(_) => remaining,
            };

            lot.consume(consumed, price, at);
            remaining -= consumed;

            let profit_per_share = price - lot.buy_price;
            fills.push(Fill {
                lot_id: lot.id,
                buy_price: lot.buy_price,
                sell_price: price,
                quantity: consumed,
                profit: profit_per_share * consumed,
                profit_percent: profit_per_share / lot.buy_price * 100.0,
                lot_closed: lot.is_closed(),
            });
        }

        let sold: f64 = fills.iter().map(|f| f.quantity).sum();
        let profit: f64 = fills.iter().map(|f| f.profit).sum();
        let cost_basis: f64 = fills.iter().map(|f| f.buy_price * f.quantity).sum();
        let shortfall = if target - sold > QUANTITY_EPSILON {
            target - sold
        } else {
            0.0
        };

        let receipt = SellReceipt {
            ticker,
            price,
            requested: target,
            sold,
            shortfall,
            fills,
            profit,
            revenue: price * sold,
            cost_basis,
            profit_percent: if cost_basis > 0.0 {
                profit / cost_basis * 100.0
            } else {
                0.0
            },
            closed_at: at,
        };

        if receipt.is_partial() {
            tracing::warn!(
                ticker = %receipt.ticker,
                requested = receipt.requested,
                sold = receipt.sold,
                shortfall = receipt.shortfall,
                "Partial fill"
            );
        } else {
            tracing::debug!(
                ticker = %receipt.ticker,
                sold = receipt.sold,
                profit = receipt.profit,
                "Recorded sell"
            );
        }

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LotId;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn t(offset: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap()
    }

    #[test]
    fn test_buy_resolves_dollar_amount() {
        let mut ledger = Ledger::new();
        let receipt = ledger
            .record_buy("tsla", 50.0, SizeSpec::DollarAmount(100.0), t(0))
            .unwrap();

        assert_eq!(receipt.ticker, "TSLA");
        assert_eq!(receipt.shares, 2.0);
        assert_eq!(receipt.cost, 100.0);
        assert_eq!(ledger.held("TSLA"), 2.0);
    }

    #[test]
    fn test_buy_rejects_invalid_price() {
        let mut ledger = Ledger::new();
        let result = ledger.record_buy("AAPL", -5.0, SizeSpec::Shares(1.0), t(0));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn test_fifo_sell_across_two_lots() {
        let mut ledger = Ledger::new();
        let first = ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(10.0), t(0))
            .unwrap();
        let second = ledger
            .record_buy("AAPL", 110.0, SizeSpec::Shares(10.0), t(1))
            .unwrap();

        let receipt = ledger
            .record_sell("AAPL", 120.0, Some(SizeSpec::Shares(15.0)), t(2))
            .unwrap();

        assert_eq!(receipt.fills.len(), 2);
        assert_eq!(receipt.fills[0].lot_id, first.lot_id);
        assert_eq!(receipt.fills[0].quantity, 10.0);
        assert_relative_eq!(receipt.fills[0].profit, 200.0);
        assert!(receipt.fills[0].lot_closed);
        assert_eq!(receipt.fills[1].lot_id, second.lot_id);
        assert_eq!(receipt.fills[1].quantity, 5.0);
        assert_relative_eq!(receipt.fills[1].profit, 50.0);
        assert!(!receipt.fills[1].lot_closed);

        assert_relative_eq!(receipt.profit, 250.0);
        assert_relative_eq!(receipt.revenue, 1800.0);
        assert_relative_eq!(receipt.cost_basis, 1550.0);
        assert_eq!(receipt.shortfall, 0.0);

        let lot1 = ledger.store().lot(first.lot_id).unwrap();
        assert!(lot1.is_closed());
        assert_eq!(lot1.closed_at, Some(t(2)));
        let lot2 = ledger.store().lot(second.lot_id).unwrap();
        assert!(lot2.is_open());
        assert_eq!(lot2.open_quantity, 5.0);
    }

    #[test]
    fn test_dollar_sell_fills_exactly() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("TSLA", 50.0, SizeSpec::DollarAmount(100.0), t(0))
            .unwrap();
        let receipt = ledger
            .record_sell("TSLA", 75.0, Some(SizeSpec::DollarAmount(150.0)), t(1))
            .unwrap();

        assert_eq!(receipt.requested, 2.0);
        assert_eq!(receipt.sold, 2.0);
        assert!(!receipt.is_partial());
        assert_relative_eq!(receipt.profit, 50.0);
        assert_relative_eq!(receipt.profit_percent, 50.0);
    }

    #[test]
    fn test_sell_without_position() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(1.0), t(0))
            .unwrap();
        let before = ledger.store().clone();

        let result = ledger.record_sell("MSFT", 100.0, None, t(1));
        assert!(matches!(result, Err(Error::NoOpenPosition(ref t)) if t == "MSFT"));
        assert_eq!(
            ledger.store().all_lots().collect::<Vec<_>>(),
            before.all_lots().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_sell_invalid_price_leaves_state() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(1.0), t(0))
            .unwrap();

        let result = ledger.record_sell("AAPL", 0.0, None, t(1));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        let result = ledger.record_sell("AAPL", 10.0, Some(SizeSpec::Shares(0.0)), t(1));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(ledger.held("AAPL"), 1.0);
    }

    #[test]
    fn test_partial_fill_reports_shortfall() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("NVDA", 400.0, SizeSpec::Shares(3.0), t(0))
            .unwrap();
        ledger
            .record_buy("NVDA", 420.0, SizeSpec::Shares(2.0), t(1))
            .unwrap();

        let receipt = ledger
            .record_sell("NVDA", 450.0, Some(SizeSpec::Shares(8.0)), t(2))
            .unwrap();

        assert!(receipt.is_partial());
        assert_eq!(receipt.requested, 8.0);
        assert_eq!(receipt.sold, 5.0);
        assert_eq!(receipt.shortfall, 3.0);
        assert_eq!(ledger.held("NVDA"), 0.0);
        assert_eq!(ledger.store().closed_lots().count(), 2);

        // The executed part is kept; a further sell finds nothing.
        let again = ledger.record_sell("NVDA", 450.0, None, t(3));
        assert!(matches!(again, Err(Error::NoOpenPosition(_))));
    }

    #[test]
    fn test_sell_all_by_default() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("AMD", 10.0, SizeSpec::DollarAmount(1.0), t(0))
            .unwrap();
        ledger
            .record_buy("AMD", 30.0, SizeSpec::DollarAmount(1.0), t(1))
            .unwrap();

        let receipt = ledger.record_sell("amd", 20.0, None, t(2)).unwrap();
        assert_eq!(receipt.fills.len(), 2);
        assert!(!receipt.is_partial());
        assert_eq!(ledger.held("AMD"), 0.0);
        assert!(ledger.store().lots_for("AMD").iter().all(Lot::is_closed));
    }

    #[test]
    fn test_partial_consumption_across_sells() {
        let mut ledger = Ledger::new();
        let buy = ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(0.3), t(0))
            .unwrap();
        ledger
            .record_buy("AAPL", 200.0, SizeSpec::Shares(1.0), t(1))
            .unwrap();

        ledger
            .record_sell("AAPL", 150.0, Some(SizeSpec::Shares(0.1)), t(2))
            .unwrap();
        let receipt = ledger
            .record_sell("AAPL", 150.0, Some(SizeSpec::Shares(0.2)), t(3))
            .unwrap();

        // Floating dust from 0.3 - 0.1 must not spill into the second lot.
        assert_eq!(receipt.fills.len(), 1);
        assert_eq!(receipt.fills[0].lot_id, buy.lot_id);
        assert!(receipt.fills[0].lot_closed);
        assert_eq!(receipt.shortfall, 0.0);
        assert_eq!(ledger.store().lot(buy.lot_id).unwrap().sells.len(), 2);
        assert_eq!(ledger.held("AAPL"), 1.0);
    }

    #[test]
    fn test_lot_residue_closes_with_last_sell() {
        let mut ledger = Ledger::new();
        let buy = ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(1.1), t(0))
            .unwrap();
        ledger
            .record_sell("AAPL", 110.0, Some(SizeSpec::Shares(1.0)), t(1))
            .unwrap();
        let receipt = ledger
            .record_sell("AAPL", 110.0, Some(SizeSpec::Shares(0.1)), t(2))
            .unwrap();

        assert_eq!(receipt.shortfall, 0.0);
        assert!(receipt.fills[0].lot_closed);
        let lot = ledger.store().lot(buy.lot_id).unwrap();
        assert_eq!(lot.open_quantity, 0.0);
        assert_eq!(lot.closed_at, Some(t(2)));
        assert_eq!(ledger.held("AAPL"), 0.0);
        assert!(ledger.summarize_open().is_empty());
        assert!(matches!(
            ledger.record_sell("AAPL", 110.0, None, t(3)),
            Err(Error::NoOpenPosition(_))
        ));
    }

    #[test]
    fn test_restore_ticker_undoes_trades() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(2.0), t(0))
            .unwrap();
        let before = ledger.snapshot_ticker("AAPL");
        let empty = ledger.snapshot_ticker("MSFT");

        ledger.record_sell("AAPL", 120.0, None, t(1)).unwrap();
        ledger
            .record_buy("MSFT", 300.0, SizeSpec::Shares(1.0), t(2))
            .unwrap();
        ledger.restore_ticker("AAPL", before.clone()).unwrap();
        ledger.restore_ticker("MSFT", empty).unwrap();

        assert_eq!(ledger.snapshot_ticker("AAPL"), before);
        assert_eq!(ledger.held("AAPL"), 2.0);
        assert_eq!(ledger.store().tickers().count(), 1);
    }

    #[test]
    fn test_lots_never_reopen() {
        let mut ledger = Ledger::new();
        let buy = ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(1.0), t(0))
            .unwrap();
        ledger.record_sell("AAPL", 110.0, None, t(1)).unwrap();
        ledger
            .record_buy("AAPL", 120.0, SizeSpec::Shares(1.0), t(2))
            .unwrap();
        ledger.record_sell("AAPL", 130.0, None, t(3)).unwrap();

        let lot = ledger.store().lot(buy.lot_id).unwrap();
        assert_eq!(lot.sells.len(), 1);
        assert_eq!(lot.open_quantity, 0.0);
        assert_eq!(lot.closed_at, Some(t(1)));
    }

    #[test]
    fn test_tickers_are_isolated() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(1.0), t(0))
            .unwrap();
        ledger
            .record_buy("MSFT", 300.0, SizeSpec::Shares(2.0), t(0) + Duration::seconds(1))
            .unwrap();

        ledger.record_sell("AAPL", 90.0, None, t(2)).unwrap();
        assert_eq!(ledger.held("AAPL"), 0.0);
        assert_eq!(ledger.held("MSFT"), 2.0);
        assert_eq!(ledger.store().lot(LotId(2)).unwrap().sells.len(), 0);
    }
}
