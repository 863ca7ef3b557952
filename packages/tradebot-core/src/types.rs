//! Core data types for the TradeBot ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Identity of a lot, unique across all tickers of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub u64);

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A discrete batch of shares bought at one price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lot {
    /// Lot identity
    pub id: LotId,
    /// Stock ticker symbol (uppercase)
    pub ticker: String,
    /// Price paid per share
    pub buy_price: f64,
    /// Shares bought when the lot was opened
    pub quantity: f64,
    /// Shares not yet sold
    pub open_quantity: f64,
    /// When the lot was bought
    pub opened_at: DateTime<Utc>,
    /// When the last share was sold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Sell attributions drawn from this lot, in order
    #[serde(default)]
    pub sells: Vec<SellAttribution>,
}

impl Lot {
    pub(crate) fn new(
        id: LotId,
        ticker: &str,
        buy_price: f64,
        quantity: f64,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            ticker: ticker.to_string(),
            buy_price,
            quantity,
            open_quantity: quantity,
            opened_at,
            closed_at: None,
            sells: Vec::new(),
        }
    }

    /// Whether the lot still holds shares.
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none() && self.open_quantity > 0.0
    }

    /// Whether every share of the lot has been sold.
    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// Purchase value of the shares still held.
    pub fn open_cost(&self) -> f64 {
        self.open_quantity * self.buy_price
    }

    /// Total shares attributed to sells.
    pub fn sold_quantity(&self) -> f64 {
        self.sells.iter().map(|s| s.quantity).sum()
    }

    /// Realized profit across all sells of this lot.
    pub fn realized_profit(&self) -> f64 {
        self.sells.iter().map(|s| s.profit(self.buy_price)).sum()
    }

    /// Draw `quantity` shares out of this lot at `sell_price`.
    ///
    /// The caller guarantees `0 < quantity <= open_quantity` and that the lot
    /// is open. Subtracting the full open quantity leaves exactly zero, which
    /// closes the lot.
    pub(crate) fn consume(&mut self, quantity: f64, sell_price: f64, at: DateTime<Utc>) {
        debug_assert!(self.is_open(), "consume on closed lot {}", self.id);
        debug_assert!(quantity > 0.0 && quantity <= self.open_quantity);

        self.sells.push(SellAttribution {
            sell_price,
            quantity,
            closed_at: at,
        });
        self.open_quantity -= quantity;
        if self.open_quantity <= 0.0 {
            self.open_quantity = 0.0;
            self.closed_at = Some(at);
        }
    }
}

/// Record of how much of a lot a single sell drew down and at what price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SellAttribution {
    /// Price received per share
    pub sell_price: f64,
    /// Shares sold out of the lot
    pub quantity: f64,
    /// When the sell happened
    pub closed_at: DateTime<Utc>,
}

impl SellAttribution {
    /// Profit of this attribution given the lot's buy price.
    pub fn profit(&self, buy_price: f64) -> f64 {
        (self.sell_price - buy_price) * self.quantity
    }
}

/// How large a buy or sell is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SizeSpec {
    /// Direct share count
    Shares(f64),
    /// Dollar amount, converted to shares at the trade price
    DollarAmount(f64),
}

impl SizeSpec {
    /// Resolve to a share count at `price`.
    ///
    /// Fails with [`Error::InvalidInput`] unless the price and the resulting
    /// share count are both positive and finite.
    pub fn resolve(&self, price: f64) -> Result<f64> {
        validate_price(price)?;
        let shares = match *self {
            SizeSpec::Shares(n) => n,
            SizeSpec::DollarAmount(d) => d / price,
        };
        if !shares.is_finite() || shares <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Quantity must be greater than 0 (got {})",
                shares
            )));
        }
        Ok(shares)
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpec::Shares(n) => write!(f, "{} shares", n),
            SizeSpec::DollarAmount(d) => write!(f, "${}", d),
        }
    }
}

/// Uppercase and trim a ticker symbol.
pub fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(Error::InvalidInput("Ticker must not be empty".to_string()));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(Error::InvalidInput(format!("Invalid ticker: {}", raw.trim())));
    }
    Ok(ticker)
}

pub(crate) fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::InvalidInput(
            "Price must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Outcome of a buy, used to confirm the trade to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuyReceipt {
    pub lot_id: LotId,
    pub ticker: String,
    pub price: f64,
    pub shares: f64,
    pub cost: f64,
    pub opened_at: DateTime<Utc>,
}

/// One lot's share of a sell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub lot_id: LotId,
    pub buy_price: f64,
    pub sell_price: f64,
    pub quantity: f64,
    pub profit: f64,
    pub profit_percent: f64,
    /// Whether this fill emptied the lot
    pub lot_closed: bool,
}

/// Outcome of a sell, possibly a partial fill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SellReceipt {
    pub ticker: String,
    pub price: f64,
    /// Shares asked for
    pub requested: f64,
    /// Shares actually sold
    pub sold: f64,
    /// `requested - sold`; zero unless inventory ran out
    pub shortfall: f64,
    /// Per-lot attributions created by this sell, oldest lot first
    pub fills: Vec<Fill>,
    /// Realized profit across all fills
    pub profit: f64,
    /// `price * sold`
    pub revenue: f64,
    /// Purchase value of the shares sold
    pub cost_basis: f64,
    /// `profit / cost_basis * 100`
    pub profit_percent: f64,
    pub closed_at: DateTime<Utc>,
}

impl SellReceipt {
    /// Whether the sell could not be fully satisfied.
    pub fn is_partial(&self) -> bool {
        self.shortfall > 0.0
    }
}

/// Per-lot detail of an open position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenLotDetail {
    pub lot_id: LotId,
    pub buy_price: f64,
    pub open_quantity: f64,
    pub opened_at: DateTime<Utc>,
}

/// Shares currently held for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenPosition {
    pub ticker: String,
    pub total_open_quantity: f64,
    /// Purchase value of the shares held
    pub cost_basis: f64,
    /// `cost_basis / total_open_quantity`
    pub average_price: f64,
    /// Open lots, oldest first
    pub lots: Vec<OpenLotDetail>,
}

/// One realized sell attribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedTrade {
    pub ticker: String,
    pub lot_id: LotId,
    pub buy_price: f64,
    pub sell_price: f64,
    pub quantity: f64,
    pub profit: f64,
    pub profit_percent: f64,
    pub closed_at: DateTime<Utc>,
}

/// Realized profit for a single ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerProfit {
    pub ticker: String,
    pub quantity_sold: f64,
    pub cost_basis: f64,
    pub revenue: f64,
    pub profit: f64,
}

/// Realized profit per ticker and in aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProfitSummary {
    pub per_ticker: Vec<TickerProfit>,
    pub total: f64,
}

/// API response wrapper for CLI output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
