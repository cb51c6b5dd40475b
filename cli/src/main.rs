//! Tasa operator CLI
//!
//! Fetch, override and inspect rates directly against the database.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tasa_common::RatePair;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Operator;

/// Tasa operator CLI
#[derive(Parser, Debug)]
#[command(name = "tasa")]
#[command(about = "Operator tool for the Tasa exchange-rate engine")]
struct Args {
    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Per-source timeout in seconds
    #[arg(long, default_value = "8")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the current rate through the full fallback chain
    Rate {
        pair: RatePair,
        /// Skip the stored-rate freshness check
        #[arg(long)]
        force: bool,
    },
    /// Store an operator-supplied rate
    Manual { pair: RatePair, rate: Decimal },
    /// Print per-source health for a pair
    Health { pair: RatePair },
    /// Delete all but the newest rows of a pair's table
    Cleanup {
        pair: RatePair,
        #[arg(long, default_value_t = tasa_common::constants::KEEP_RECORDS)]
        keep: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&args.database_url)
        .await?;
    let client = reqwest::Client::new();
    let operator = Operator::postgres(pool, client, std::time::Duration::from_secs(args.timeout));

    let output = match args.command {
        Command::Rate { pair, force } => serde_json::to_value(operator.rate(pair, force).await?)?,
        Command::Manual { pair, rate } => serde_json::to_value(operator.manual(pair, rate).await?)?,
        Command::Health { pair } => serde_json::to_value(operator.health(pair).await?)?,
        Command::Cleanup { pair, keep } => serde_json::to_value(operator.cleanup(pair, keep).await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
