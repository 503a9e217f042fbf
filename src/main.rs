use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use dealer_ratios::models::Config;
use dealer_ratios::pipeline::TablePipeline;
use dealer_ratios::wrds::WrdsClient;

/// Rebuild the primary-dealer capital-share tables (Table 02) from curated
/// reference data and the fundamentals provider.
#[derive(Debug, Parser)]
#[command(name = "dealer-ratios", version, about)]
struct Cli {
    /// Build the extended-cutoff variant (updated_table02 outputs)
    #[arg(long)]
    extended: bool,

    /// Build both the baseline and extended variants
    #[arg(long, conflicts_with = "extended")]
    all: bool,

    /// Directory holding manual/ reference tables and pulled/ snapshots
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory receiving the rendered .tex files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Sample start date (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Baseline sample end date (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "dealer_ratios=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(start_date) = cli.start_date {
        config.start_date = start_date;
    }
    if let Some(end_date) = cli.end_date {
        config.end_date = end_date;
    }

    let variants: Vec<bool> = if cli.all {
        vec![false, true]
    } else {
        vec![cli.extended]
    };

    for extended in variants {
        let mut variant_config = config.clone();
        variant_config.use_extended_range = extended;
        let client = WrdsClient::new(&variant_config)?;
        let pipeline = TablePipeline::new(client, variant_config);
        pipeline.run().await?;
    }

    Ok(())
}
