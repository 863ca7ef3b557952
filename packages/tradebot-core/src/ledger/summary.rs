//! Read-only projections of the ledger.

use std::collections::BTreeMap;

use super::engine::Ledger;
use crate::types::{
    ClosedTrade, OpenLotDetail, OpenPosition, ProfitSummary, TickerProfit,
};

impl Ledger {
    /// Open positions per ticker, sorted by ticker.
    pub fn summarize_open(&self) -> Vec<OpenPosition> {
        self.store()
            .tickers()
            .filter_map(|ticker| {
                let lots: Vec<OpenLotDetail> = self
                    .store()
                    .open_lots_for(ticker)
                    .map(|lot| OpenLotDetail {
                        lot_id: lot.id,
                        buy_price: lot.buy_price,
                        open_quantity: lot.open_quantity,
                        opened_at: lot.opened_at,
                    })
                    .collect();
                if lots.is_empty() {
                    return None;
                }

                let total_open_quantity: f64 = lots.iter().map(|l| l.open_quantity).sum();
                let cost_basis: f64 = lots.iter().map(|l| l.open_quantity * l.buy_price).sum();
                Some(OpenPosition {
                    ticker: ticker.to_string(),
                    total_open_quantity,
                    cost_basis,
                    average_price: cost_basis / total_open_quantity,
                    lots,
                })
            })
            .collect()
    }

    /// One row per sell attribution, newest first.
    pub fn summarize_closed(&self) -> Vec<ClosedTrade> {
        let mut rows: Vec<ClosedTrade> = self
            .store()
            .all_lots()
            .flat_map(|lot| {
                lot.sells.iter().map(move |sell| {
                    let profit = sell.profit(lot.buy_price);
                    ClosedTrade {
                        ticker: lot.ticker.clone(),
                        lot_id: lot.id,
                        buy_price: lot.buy_price,
                        sell_price: sell.sell_price,
                        quantity: sell.quantity,
                        profit,
                        profit_percent: (sell.sell_price - lot.buy_price) / lot.buy_price * 100.0,
                        closed_at: sell.closed_at,
                    }
                })
            })
            .collect();

        // Stable sort keeps FIFO order among rows of the same sell.
        rows.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        rows
    }

    /// Realized profit per ticker and in total.
    pub fn realized_profit(&self) -> ProfitSummary {
        let mut per_ticker: BTreeMap<String, TickerProfit> = BTreeMap::new();
        for row in self.summarize_closed() {
            let entry = per_ticker
                .entry(row.ticker.clone())
                .or_insert_with(|| TickerProfit {
                    ticker: row.ticker.clone(),
                    quantity_sold: 0.0,
                    cost_basis: 0.0,
                    revenue: 0.0,
                    profit: 0.0,
                });
            entry.quantity_sold += row.quantity;
            entry.cost_basis += row.buy_price * row.quantity;
            entry.revenue += row.sell_price * row.quantity;
            entry.profit += row.profit;
        }

        let per_ticker: Vec<TickerProfit> = per_ticker.into_values().collect();
        let total = per_ticker.iter().map(|p| p.profit).sum();
        ProfitSummary { per_ticker, total }
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::Ledger;
    use crate::types::SizeSpec;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Utc};

    fn t(offset: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap()
    }

    fn sample() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(10.0), t(0))
            .unwrap();
        ledger
            .record_buy("AAPL", 110.0, SizeSpec::Shares(10.0), t(1))
            .unwrap();
        ledger
            .record_buy("TSLA", 50.0, SizeSpec::Shares(2.0), t(2))
            .unwrap();
        ledger
            .record_sell("AAPL", 120.0, Some(SizeSpec::Shares(15.0)), t(3))
            .unwrap();
        ledger.record_sell("TSLA", 40.0, None, t(4)).unwrap();
        ledger
    }

    #[test]
    fn test_summarize_open() {
        let ledger = sample();
        let open = ledger.summarize_open();

        assert_eq!(open.len(), 1);
        assert_eq!(open[0].ticker, "AAPL");
        assert_eq!(open[0].total_open_quantity, 5.0);
        assert_relative_eq!(open[0].cost_basis, 550.0);
        assert_relative_eq!(open[0].average_price, 110.0);
        assert_eq!(open[0].lots.len(), 1);
    }

    #[test]
    fn test_summarize_closed_newest_first() {
        let ledger = sample();
        let closed = ledger.summarize_closed();

        assert_eq!(closed.len(), 3);
        assert_eq!(closed[0].ticker, "TSLA");
        assert_relative_eq!(closed[0].profit, -20.0);
        assert_relative_eq!(closed[0].profit_percent, -20.0);
        assert_eq!(closed[1].buy_price, 100.0);
        assert_eq!(closed[2].buy_price, 110.0);
        assert_eq!(closed[2].quantity, 5.0);
    }

    #[test]
    fn test_realized_profit() {
        let ledger = sample();
        let summary = ledger.realized_profit();

        assert_eq!(summary.per_ticker.len(), 2);
        assert_eq!(summary.per_ticker[0].ticker, "AAPL");
        assert_relative_eq!(summary.per_ticker[0].profit, 250.0);
        assert_relative_eq!(summary.per_ticker[0].revenue, 1800.0);
        assert_relative_eq!(summary.per_ticker[1].profit, -20.0);
        assert_relative_eq!(summary.total, 230.0);
    }

    #[test]
    fn test_empty_ledger_summaries() {
        let ledger = Ledger::new();
        assert!(ledger.summarize_open().is_empty());
        assert!(ledger.summarize_closed().is_empty());
        assert_eq!(ledger.realized_profit().total, 0.0);
    }
}
