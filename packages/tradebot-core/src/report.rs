//! Human-readable messages for chat replies.
//!
//! All display rounding happens here: currency to 2 decimals, shares to 6.

use std::fmt::Write;

use crate::types::{BuyReceipt, ClosedTrade, OpenPosition, ProfitSummary, SellReceipt};
use crate::Error;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `$1,234.50` style currency with a leading minus for losses.
pub fn money(value: f64) -> String {
    let cents = format!("{:.2}", value.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // -0.001 rounds to 0.00 and should not print as a loss
    let sign = if value < 0.0 && cents != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac)
}

/// Share count with up to 6 decimals and no trailing zeros.
pub fn shares(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Signed percentage with 2 decimals.
pub fn percent(value: f64) -> String {
    format!("{:+.2}%", value)
}

fn trend(value: f64) -> &'static str {
    if value >= 0.0 {
        "📈"
    } else {
        "📉"
    }
}

/// Welcome text listing the commands.
pub fn help() -> String {
    [
        "Welcome to TradeBot! 📈",
        "",
        "Available commands:",
        "/buy {ticker} {price} [shares | $amount] - Add a buy trade",
        "/sell {ticker} {price} [shares | $amount] - Sell (oldest lots first, whole position by default)",
        "/profit - Show profit from completed trades",
        "/trades - Show all open positions",
    ]
    .join("\n")
}

pub fn buy_confirmation(receipt: &BuyReceipt) -> String {
    format!(
        "✅ Buy order added:\nTicker: {}\nPrice: {}\nShares: {}\nCost: {}\nLot: {}",
        receipt.ticker,
        money(receipt.price),
        shares(receipt.shares),
        money(receipt.cost),
        receipt.lot_id,
    )
}

pub fn sell_confirmation(receipt: &SellReceipt) -> String {
    let all_closed = receipt.fills.iter().all(|f| f.lot_closed);
    let mut message = format!(
        "{} {}:\nTicker: {}\nSell Price: {}\nShares Sold: {}\n",
        trend(receipt.profit),
        if all_closed { "Trade closed" } else { "Position reduced" },
        receipt.ticker,
        money(receipt.price),
        shares(receipt.sold),
    );

    match receipt.fills.as_slice() {
        [single] => {
            let _ = writeln!(message, "Buy Price: {}", money(single.buy_price));
        }
        fills => {
            message.push_str("Lots:\n");
            for fill in fills {
                let _ = writeln!(
                    message,
                    "   {}: {} @ {} → {} ({})",
                    fill.lot_id,
                    shares(fill.quantity),
                    money(fill.buy_price),
                    money(fill.profit),
                    percent(fill.profit_percent),
                );
            }
        }
    }

    let _ = write!(
        message,
        "Profit: {} ({})",
        money(receipt.profit),
        percent(receipt.profit_percent)
    );

    if receipt.is_partial() {
        let _ = write!(
            message,
            "\n⚠️ Only {} of {} requested shares were held; {} could not be sold.",
            shares(receipt.sold),
            shares(receipt.requested),
            shares(receipt.shortfall),
        );
    }

    message
}

/// Closed trades, newest first, with the total realized profit.
pub fn profit_report(closed: &[ClosedTrade], summary: &ProfitSummary) -> String {
    if closed.is_empty() {
        return "No completed trades found.".to_string();
    }

    let mut message = String::from("📊 *Completed Trades & Profits:*\n\n");
    for row in closed {
        let _ = write!(
            message,
            "{} *{}*\n   Buy: {} → Sell: {}\n   Shares: {}\n   Profit: {} ({})\n   Closed: {}\n\n",
            trend(row.profit),
            row.ticker,
            money(row.buy_price),
            money(row.sell_price),
            shares(row.quantity),
            money(row.profit),
            percent(row.profit_percent),
            row.closed_at.format(DATE_FORMAT),
        );
    }

    if summary.per_ticker.len() > 1 {
        message.push_str("*By ticker:*\n");
        for ticker in &summary.per_ticker {
            let _ = writeln!(message, "   {}: {}", ticker.ticker, money(ticker.profit));
        }
        message.push('\n');
    }

    let total_emoji = if summary.total >= 0.0 { "🎉" } else { "😞" };
    let _ = write!(
        message,
        "{} *Total Profit: {}*",
        total_emoji,
        money(summary.total)
    );
    message
}

pub fn open_positions(positions: &[OpenPosition]) -> String {
    if positions.is_empty() {
        return "No open positions found.".to_string();
    }

    let mut message = String::from("📋 *Open Positions:*\n\n");
    for position in positions {
        let _ = write!(
            message,
            "📈 *{}*\n   Shares: {}\n   Avg Price: {}\n   Cost Basis: {}\n",
            position.ticker,
            shares(position.total_open_quantity),
            money(position.average_price),
            money(position.cost_basis),
        );
        for lot in &position.lots {
            let _ = writeln!(
                message,
                "   {}: {} @ {} (opened {})",
                lot.lot_id,
                shares(lot.open_quantity),
                money(lot.buy_price),
                lot.opened_at.format(DATE_FORMAT),
            );
        }
        message.push('\n');
    }
    message.trim_end().to_string()
}

/// User-facing wording for an error.
pub fn error_message(error: &Error) -> String {
    match error {
        Error::InvalidInput(msg) | Error::Usage(msg) => msg.clone(),
        Error::NoOpenPosition(ticker) => format!("No open position found for {}", ticker),
        Error::UnknownCommand(cmd) => {
            format!("Unknown command {}. Send /start to see what I can do.", cmd)
        }
        Error::Io(_) | Error::Json(_) | Error::Config(_) => {
            "An error occurred. Please try again.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::types::SizeSpec;
    use chrono::{DateTime, Utc};

    fn t(offset: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap()
    }

    #[test]
    fn test_money() {
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(150.5), "$150.50");
        assert_eq!(money(-1.5), "-$1.50");
        assert_eq!(money(1234567.891), "$1,234,567.89");
        assert_eq!(money(-0.001), "$0.00");
    }

    #[test]
    fn test_shares() {
        assert_eq!(shares(10.0), "10");
        assert_eq!(shares(2.5), "2.5");
        assert_eq!(shares(1.0 / 3.0), "0.333333");
        assert_eq!(shares(0.0000001), "0");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(16.129), "+16.13%");
        assert_eq!(percent(-20.0), "-20.00%");
    }

    #[test]
    fn test_sell_confirmation_itemizes_lots() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(10.0), t(0))
            .unwrap();
        ledger
            .record_buy("AAPL", 110.0, SizeSpec::Shares(10.0), t(1))
            .unwrap();
        let receipt = ledger
            .record_sell("AAPL", 120.0, Some(SizeSpec::Shares(15.0)), t(2))
            .unwrap();

        let text = sell_confirmation(&receipt);
        assert!(text.starts_with("📈 Position reduced:"));
        assert!(text.contains("#1: 10 @ $100.00 → $200.00 (+20.00%)"));
        assert!(text.contains("#2: 5 @ $110.00 → $50.00 (+9.09%)"));
        assert!(text.contains("Profit: $250.00 (+16.13%)"));
        assert!(!text.contains("⚠️"));
    }

    #[test]
    fn test_sell_confirmation_partial_fill() {
        let mut ledger = Ledger::new();
        ledger
            .record_buy("TSLA", 50.0, SizeSpec::Shares(2.0), t(0))
            .unwrap();
        let receipt = ledger
            .record_sell("TSLA", 40.0, Some(SizeSpec::Shares(5.0)), t(1))
            .unwrap();

        let text = sell_confirmation(&receipt);
        assert!(text.starts_with("📉 Trade closed:"));
        assert!(text.contains("Buy Price: $50.00"));
        assert!(text.contains("Profit: -$20.00 (-20.00%)"));
        assert!(text.contains("Only 2 of 5 requested shares were held; 3 could not be sold."));
    }

    #[test]
    fn test_profit_report() {
        let mut ledger = Ledger::new();
        assert_eq!(
            profit_report(&ledger.summarize_closed(), &ledger.realized_profit()),
            "No completed trades found."
        );

        ledger
            .record_buy("AAPL", 100.0, SizeSpec::Shares(1.0), t(0))
            .unwrap();
        ledger.record_sell("AAPL", 90.0, None, t(1)).unwrap();
        let text = profit_report(&ledger.summarize_closed(), &ledger.realized_profit());
        assert!(text.contains("📉 *AAPL*"));
        assert!(text.contains("Buy: $100.00 → Sell: $90.00"));
        assert!(text.ends_with("😞 *Total Profit: -$10.00*"));
        assert!(!text.contains("By ticker"));
    }

    #[test]
    fn test_open_positions() {
        let mut ledger = Ledger::new();
        assert_eq!(open_positions(&[]), "No open positions found.");

        ledger
            .record_buy("MSFT", 300.0, SizeSpec::DollarAmount(100.0), t(0))
            .unwrap();
        let text = open_positions(&ledger.summarize_open());
        assert!(text.contains("📈 *MSFT*"));
        assert!(text.contains("Shares: 0.333333"));
        assert!(text.contains("Cost Basis: $100.00"));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(&Error::NoOpenPosition("AAPL".to_string())),
            "No open position found for AAPL"
        );
        assert_eq!(
            error_message(&Error::InvalidInput("Price must be greater than 0".to_string())),
            "Price must be greater than 0"
        );
    }
}
