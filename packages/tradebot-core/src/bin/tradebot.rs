//! TradeBot CLI - record trades and inspect the ledger from a shell.
//!
//! Prints JSON for scripting, except `exec`, which prints the chat reply.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tradebot_core::{
    bot, report, ApiResponse, Config, JsonFileStorage, Ledger, SizeSpec,
};

#[derive(Parser)]
#[command(name = "tradebot")]
#[command(about = "TradeBot CLI - FIFO trade journal")]
#[command(version)]
struct Cli {
    /// Ledger file (defaults to config, then ~/.tradebot/ledger.json)
    #[arg(long, global = true)]
    ledger: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a buy
    Buy(TradeArgs),
    /// Record a sell (whole position when no size is given)
    Sell(TradeArgs),
    /// List open positions
    Positions,
    /// List realized sells, newest first
    Closed,
    /// Show realized profit per ticker
    Profit,
    /// Run a chat command, e.g. "/buy AAPL 150 10"
    Exec {
        /// Command text
        text: String,
    },
}

#[derive(Args)]
struct TradeArgs {
    /// Stock ticker
    #[arg(short, long)]
    ticker: String,
    /// Price per share
    #[arg(short, long)]
    price: f64,
    /// Number of shares
    #[arg(short = 'n', long, conflicts_with = "dollars")]
    shares: Option<f64>,
    /// Dollar amount
    #[arg(short, long)]
    dollars: Option<f64>,
}

impl TradeArgs {
    fn size(&self) -> Option<SizeSpec> {
        match (self.shares, self.dollars) {
            (Some(n), _) => Some(SizeSpec::Shares(n)),
            (None, Some(d)) => Some(SizeSpec::DollarAmount(d)),
            (None, None) => None,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = match run(cli) {
        Ok(output) => output,
        Err(e) => to_json(&ApiResponse::<()>::err(e.to_string())),
    };
    println!("{}", output);
}

fn to_json<T: serde::Serialize>(response: &ApiResponse<T>) -> String {
    serde_json::to_string_pretty(response)
        .unwrap_or_else(|e| format!("{{\"ok\":false,\"error\":\"{}\"}}", e))
}

fn run(cli: Cli) -> tradebot_core::Result<String> {
    let path = match cli.ledger {
        Some(path) => path,
        None => Config::load()?.ledger_path(),
    };
    let storage = JsonFileStorage::with_path(path);
    let mut ledger = Ledger::load_from(&storage)?;
    tracing::debug!(path = %storage.path().display(), "Ledger loaded");
    let now = Utc::now();

    let output = match cli.command {
        Commands::Buy(args) => {
            let receipt = ledger.record_buy(
                &args.ticker,
                args.price,
                args.size().unwrap_or(SizeSpec::Shares(1.0)),
                now,
            )?;
            ledger.persist_ticker(&storage, &receipt.ticker)?;
            to_json(&ApiResponse::ok(receipt))
        }
        Commands::Sell(args) => {
            let receipt = ledger.record_sell(&args.ticker, args.price, args.size(), now)?;
            ledger.persist_ticker(&storage, &receipt.ticker)?;
            to_json(&ApiResponse::ok(receipt))
        }
        Commands::Positions => to_json(&ApiResponse::ok(json!({
            "positions": ledger.summarize_open(),
        }))),
        Commands::Closed => to_json(&ApiResponse::ok(json!({
            "closed": ledger.summarize_closed(),
        }))),
        Commands::Profit => to_json(&ApiResponse::ok(ledger.realized_profit())),
        Commands::Exec { text } => match bot::handle_text(&mut ledger, &text, now) {
            Some(reply) => {
                if let Some(ticker) = &reply.mutated_ticker {
                    ledger.persist_ticker(&storage, ticker)?;
                }
                reply.text
            }
            None => report::help(),
        },
    };

    Ok(output)
}
