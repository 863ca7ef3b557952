//! Command dispatch: runs a parsed command against a ledger and renders the
//! reply. Transport-agnostic; the server and the CLI both go through here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::command::{self, Command};
use crate::ledger::Ledger;
use crate::report;
use crate::Error;

/// Text to send back to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    /// Whether `text` uses Markdown emphasis
    pub markdown: bool,
    /// Ticker whose lots changed and must be persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutated_ticker: Option<String>,
}

impl Reply {
    fn plain(text: String) -> Self {
        Self {
            text,
            markdown: false,
            mutated_ticker: None,
        }
    }

    fn markdown(text: String) -> Self {
        Self {
            text,
            markdown: true,
            mutated_ticker: None,
        }
    }

    /// User-facing reply for a rejected command.
    pub fn from_error(error: &Error) -> Self {
        Self::plain(report::error_message(error))
    }
}

fn profit_reply(ledger: &Ledger) -> Reply {
    Reply::markdown(report::profit_report(
        &ledger.summarize_closed(),
        &ledger.realized_profit(),
    ))
}

fn trades_reply(ledger: &Ledger) -> Reply {
    Reply::markdown(report::open_positions(&ledger.summarize_open()))
}

/// Answer a command that only reads the ledger.
///
/// Returns `None` for commands that mutate it.
pub fn query(ledger: &Ledger, command: &Command) -> Option<Reply> {
    match command {
        Command::Help => Some(Reply::plain(report::help())),
        Command::Profit => Some(profit_reply(ledger)),
        Command::Trades => Some(trades_reply(ledger)),
        Command::Buy { .. } | Command::Sell { .. } => None,
    }
}

/// Run a command and render the reply.
///
/// Ledger errors become user-facing text; they never leave the ledger half
/// updated, so `mutated_ticker` is only set on success.
pub fn execute(ledger: &mut Ledger, command: Command, now: DateTime<Utc>) -> Reply {
    let outcome = match command {
        Command::Buy {
            ticker,
            price,
            size,
        } => ledger
            .record_buy(&ticker, price, size, now)
            .map(|receipt| (receipt.ticker.clone(), report::buy_confirmation(&receipt))),
        Command::Sell {
            ticker,
            price,
            size,
        } => ledger
            .record_sell(&ticker, price, size, now)
            .map(|receipt| (receipt.ticker.clone(), report::sell_confirmation(&receipt))),
        read_only => {
            return query(ledger, &read_only).unwrap_or_else(|| Reply::plain(report::help()))
        }
    };

    match outcome {
        Ok((ticker, text)) => Reply {
            text,
            markdown: false,
            mutated_ticker: Some(ticker),
        },
        Err(e) => {
            tracing::debug!("Command rejected: {}", e);
            Reply::from_error(&e)
        }
    }
}

/// Parse and execute a chat message.
///
/// Returns `None` when the text is not a command.
pub fn handle_text(ledger: &mut Ledger, text: &str, now: DateTime<Utc>) -> Option<Reply> {
    match command::parse(text) {
        Ok(Some(command)) => Some(execute(ledger, command, now)),
        Ok(None) => None,
        Err(e) => Some(Reply::from_error(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_then_sell_flow() {
        let mut ledger = Ledger::new();
        let now = Utc::now();

        let reply = handle_text(&mut ledger, "/buy aapl 100 10", now).unwrap();
        assert!(reply.text.starts_with("✅ Buy order added:"));
        assert_eq!(reply.mutated_ticker.as_deref(), Some("AAPL"));

        let reply = handle_text(&mut ledger, "/sell AAPL 120", now).unwrap();
        assert!(reply.text.contains("Profit: $200.00 (+20.00%)"));
        assert_eq!(reply.mutated_ticker.as_deref(), Some("AAPL"));
    }

    #[test]
    fn test_errors_do_not_mark_mutation() {
        let mut ledger = Ledger::new();
        let reply = handle_text(&mut ledger, "/sell TSLA 100", Utc::now()).unwrap();
        assert_eq!(reply.text, "No open position found for TSLA");
        assert!(reply.mutated_ticker.is_none());

        let reply = handle_text(&mut ledger, "/buy TSLA", Utc::now()).unwrap();
        assert!(reply.text.starts_with("Usage: /buy"));
        assert!(reply.mutated_ticker.is_none());
    }

    #[test]
    fn test_queries_are_markdown() {
        let mut ledger = Ledger::new();
        let reply = handle_text(&mut ledger, "/trades", Utc::now()).unwrap();
        assert!(reply.markdown);
        assert_eq!(reply.text, "No open positions found.");

        let reply = handle_text(&mut ledger, "/start", Utc::now()).unwrap();
        assert!(!reply.markdown);
        assert!(reply.text.contains("/profit"));
    }

    #[test]
    fn test_execute_matches_query_for_reads() {
        let mut ledger = Ledger::new();
        handle_text(&mut ledger, "/buy AAPL 100 2", Utc::now()).unwrap();

        for command in [Command::Help, Command::Profit, Command::Trades] {
            let expected = query(&ledger, &command).unwrap();
            let reply = execute(&mut ledger, command, Utc::now());
            assert_eq!(reply, expected);
            assert!(reply.mutated_ticker.is_none());
        }
        let buy = Command::Buy {
            ticker: "AAPL".to_string(),
            price: 1.0,
            size: crate::types::SizeSpec::Shares(1.0),
        };
        assert!(query(&ledger, &buy).is_none());
    }

    #[test]
    fn test_plain_text_is_ignored() {
        let mut ledger = Ledger::new();
        assert!(handle_text(&mut ledger, "good morning", Utc::now()).is_none());
    }
}
