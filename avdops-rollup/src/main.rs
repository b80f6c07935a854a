//! avdops-rollup — prints the most recent hourly session counts
//!
//! Connects using `DB_HOST`, `DB_USER`, `DB_PASS` and `DB_NAME` (see
//! `avdops_core::config` for defaults), runs the peak concurrency rollup and
//! prints the newest buckets to stdout, one per line.

use avdops_core::{peak_concurrency, Connector, DatabaseConfig, RollupRow};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// Number of buckets printed per run.
const PRINT_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env file if present (real env vars take precedence)
    dotenvy::dotenv().ok();

    let _args = Args::parse();

    // Logs go to stderr, stdout carries only the report
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        tracing::error!("Rollup failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let connector = Connector::new(config);

    let rows = peak_concurrency(&connector).await?;
    for line in report_lines(&rows) {
        println!("{}", line);
    }

    Ok(())
}

fn report_lines(rows: &[RollupRow]) -> Vec<String> {
    rows.iter().take(PRINT_LIMIT).map(RollupRow::to_string).collect()
}
