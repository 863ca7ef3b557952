//! Chat command parsing.
//!
//! Turns text such as `/buy AAPL 150.50 $500` into a typed [`Command`] with a
//! normalized ticker. Nothing here touches the ledger.

use crate::types::{normalize_ticker, SizeSpec};
use crate::{Error, Result};

pub const BUY_USAGE: &str = "Usage: /buy {ticker} {price} [shares | $amount]\nExample: /buy AAPL 150.50 10";
pub const SELL_USAGE: &str =
    "Usage: /sell {ticker} {price} [shares | $amount]\nExample: /sell AAPL 155.75";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `/start` or `/help`
    Help,
    /// `/buy TICKER PRICE [SIZE]`
    Buy {
        ticker: String,
        price: f64,
        size: SizeSpec,
    },
    /// `/sell TICKER PRICE [SIZE]`; no size sells the whole position
    Sell {
        ticker: String,
        price: f64,
        size: Option<SizeSpec>,
    },
    /// `/profit`
    Profit,
    /// `/trades`
    Trades,
}

impl Command {
    /// Ticker a command mutates, if any.
    pub fn ticker(&self) -> Option<&str> {
        match self {
            Command::Buy { ticker, .. } | Command::Sell { ticker, .. } => Some(ticker.as_str()),
            _ => None,
        }
    }
}

/// Parse a chat message.
///
/// Returns `Ok(None)` for text that is not a slash command.
pub fn parse(text: &str) -> Result<Option<Command>> {
    let mut words = text.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let Some(name) = head.strip_prefix('/') else {
        return Ok(None);
    };
    // Group chats address commands as /buy@BotName
    let name = name.split('@').next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match name.as_str() {
        "start" | "help" => Command::Help,
        "profit" => Command::Profit,
        "trades" => Command::Trades,
        "buy" => {
            if !(2..=3).contains(&args.len()) {
                return Err(Error::Usage(BUY_USAGE.to_string()));
            }
            Command::Buy {
                ticker: normalize_ticker(args[0])?,
                price: parse_price(args[1])?,
                size: match args.get(2) {
                    Some(raw) => parse_size(raw)?,
                    None => SizeSpec::Shares(1.0),
                },
            }
        }
        "sell" => {
            if !(2..=3).contains(&args.len()) {
                return Err(Error::Usage(SELL_USAGE.to_string()));
            }
            Command::Sell {
                ticker: normalize_ticker(args[0])?,
                price: parse_price(args[1])?,
                size: args.get(2).map(|raw| parse_size(raw)).transpose()?,
            }
        }
        other => return Err(Error::UnknownCommand(format!("/{}", other))),
    };

    Ok(Some(command))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_price(raw: &str) -> Result<f64> {
    let price = parse_number(raw.trim_start_matches('$')).ok_or_else(|| {
        Error::InvalidInput("Invalid price format. Please use numbers only.".to_string())
    })?;
    if price <= 0.0 {
        return Err(Error::InvalidInput(
            "Price must be greater than 0".to_string(),
        ));
    }
    Ok(price)
}

/// `$500` is a dollar amount; `10`, `10sh` or `10shares` is a share count.
fn parse_size(raw: &str) -> Result<SizeSpec> {
    let invalid =
        || Error::InvalidInput(format!("Invalid size: {}. Use shares (10) or dollars ($500)", raw));

    if let Some(amount) = raw.strip_prefix('$') {
        let amount = parse_number(amount).ok_or_else(invalid)?;
        return Ok(SizeSpec::DollarAmount(amount));
    }

    let lower = raw.to_lowercase();
    let count = lower
        .strip_suffix("shares")
        .or_else(|| lower.strip_suffix("sh"))
        .unwrap_or(&lower);
    let shares = parse_number(count).ok_or_else(invalid)?;
    Ok(SizeSpec::Shares(shares))
}
