//! New Relic collector CLI
//!
//! A command-line tool for listing the advertised metric catalog and
//! collecting metric namespaces once against the APM REST API.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use collector_lib::config::DEFAULT_BASE_URL;
use collector_lib::{Collector, Family};
use commands::{collect, types};
use std::time::Duration;

/// New Relic collector CLI
#[derive(Parser)]
#[command(name = "nrc")]
#[command(author, version, about = "CLI for the New Relic APM collector", long_about = None)]
pub struct Cli {
    /// REST API key (can also be set via NEWRELIC_API_KEY env var)
    #[arg(long, env = "NEWRELIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// REST API base URL
    #[arg(long, env = "NEWRELIC_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Maximum upstream calls in flight
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List advertised metric types
    Types {
        /// Only list one family
        #[arg(long)]
        family: Option<FamilyArg>,
    },

    /// Collect metric namespaces once and print the values
    Collect {
        /// Concrete namespaces, e.g. inteleon/newrelic/apm/1337/show/reporting
        #[arg(required = true)]
        namespaces: Vec<String>,
    },
}

/// Metric family by its namespace literal
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FamilyArg {
    /// Entity summary fields
    Apm,
    /// Metric time series
    Metric,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Apm => Family::EntitySummary,
            FamilyArg::Metric => Family::TimeSeries,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let collector = Collector::builder()
        .base_url(&cli.api_url)
        .upstream_concurrency(cli.concurrency)
        .request_timeout(Duration::from_secs(cli.timeout))
        .build();

    match cli.command {
        Commands::Types { family } => {
            types::list_types(&collector, family.map(Family::from), cli.format);
        }
        Commands::Collect { namespaces } => {
            collect::collect_once(&collector, cli.api_key.as_deref(), &namespaces, cli.format)
                .await?;
        }
    }

    Ok(())
}
