mod client;
mod compare;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use client::CoreClient;

#[derive(Debug, Parser)]
#[clap(name = "reservectl", version, about = "Ops client for the reserve control plane")]
struct Cli {
    /// Base URL of the reserve control plane.
    #[clap(long, default_value = "http://localhost:8000")]
    url: String,

    /// Shared secret for signed endpoints; falls back to HTTP_SECRET.
    #[clap(long)]
    secret: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cross-check journaled set-rates activities against the rates the
    /// reserve currently serves.
    CompareRates {
        /// Re-run every N seconds instead of once.
        #[clap(long)]
        watch: Option<u64>,
    },
    /// List activities that are still pending on either leg.
    Pending,
}

async fn compare_once(client: &CoreClient) -> Result<()> {
    let activities = client.activities().await?;
    let rates = client.rates().await?;
    let drifts = compare::compare_set_rates(&activities, &rates);
    if drifts.is_empty() {
        println!("all set-rates activities match the served rates");
    }
    for drift in drifts {
        println!(
            "block {}: {} {} rate differs {:.5}% from the served rate",
            drift.block,
            drift.token,
            drift.side,
            drift.difference * 100.0
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let secret = cli.secret.or_else(|| std::env::var("HTTP_SECRET").ok());
    let client = CoreClient::new(cli.url, secret)?;

    match cli.command {
        Command::CompareRates { watch } => match watch {
            None => compare_once(&client).await?,
            Some(seconds) => loop {
                if let Err(e) = compare_once(&client).await {
                    eprintln!("compare failed: {e:#}");
                }
                tokio::time::sleep(Duration::from_secs(seconds)).await;
            },
        },
        Command::Pending => {
            for activity in client.pending_activities().await? {
                println!(
                    "{} {} -> {} exchange={} mining={}",
                    activity.id,
                    activity.action,
                    activity.destination,
                    activity.exchange_status.as_str(),
                    activity.mining_status.as_str()
                );
            }
        }
    }

    Ok(())
}
