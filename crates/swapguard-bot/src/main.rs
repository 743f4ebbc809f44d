//! swapguard - protected swap entry.
//!
//! Places one entry order and its take-profit / stop-loss pair through the
//! full pipeline using paper placement, then prints the result as JSON.

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use swapguard_core::{InstId, OrderSide, Price, Size};
use swapguard_executor::EntryDecision;
use swapguard_telemetry::Metrics;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    Buy,
    Sell,
}

impl From<Side> for OrderSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => OrderSide::Buy,
            Side::Sell => OrderSide::Sell,
        }
    }
}

/// Protected swap entry
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SWAPGUARD_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Instrument id or bare asset (e.g., ETH or ETH-USDT-SWAP)
    #[arg(short, long)]
    symbol: String,

    #[arg(long, value_enum)]
    side: Side,

    /// Entry quantity, sent unmodified
    #[arg(short, long)]
    quantity: Decimal,

    /// Limit price; market entry when omitted
    #[arg(long)]
    limit_price: Option<Decimal>,

    /// Take-profit trigger price
    #[arg(long)]
    tp: Decimal,

    /// Stop-loss trigger price
    #[arg(long)]
    sl: Decimal,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    swapguard_telemetry::init_logging()?;

    info!("Starting swapguard v{}", env!("CARGO_PKG_VERSION"));

    let config = swapguard_bot::AppConfig::load(args.config.as_deref())?;
    let app = swapguard_bot::Application::new(config)?;

    let mut decision = EntryDecision::market(
        InstId::from_asset(&args.symbol)?,
        args.side.into(),
        Size::new(args.quantity),
        Price::new(args.tp),
        Price::new(args.sl),
    );
    if let Some(price) = args.limit_price {
        decision = decision.with_limit_price(Price::new(price));
    }

    let result = app.run_decision(&decision).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if args.print_metrics {
        print!("{}", Metrics::render()?);
    }

    if result.entry.is_failed() {
        bail!("entry order failed: {}", result.entry);
    }
    Ok(())
}
