use std::path::PathBuf;

use clap::Parser;

use crate::data::loader::SourceSpec;

/// Command line / environment options.
#[derive(Debug, Parser)]
#[command(name = "airline-delays")]
#[command(about = "Interactive dashboard for US airline on-time performance", long_about = None)]
pub struct Cli {
    /// Delay statistics CSV (BTS "Airline Delay Cause" export)
    #[arg(long, env = "AIRLINE_DELAYS_CSV", default_value = "Airline_Delay_Cause.csv")]
    pub delays: PathBuf,

    /// Airport reference CSV with IATA, airport_name, LATITUDE, LONGITUDE
    #[arg(long, env = "AIRLINE_AIRPORTS_CSV", default_value = "airports.csv")]
    pub airports: PathBuf,

    /// Pre-merged table (.csv or .parquet); replaces --delays/--airports
    #[arg(long, env = "AIRLINE_MERGED_TABLE")]
    pub merged: Option<PathBuf>,

    /// Rows shown in the filtered table preview
    #[arg(long, default_value_t = 100)]
    pub preview_rows: usize,

    /// Length of the airport rankings
    #[arg(long, default_value_t = 10)]
    pub top_n: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub source: SourceSpec,
    pub preview_rows: usize,
    pub top_n: usize,
}

impl DashboardConfig {
    pub fn from_args() -> Self {
        Cli::parse().into()
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source: SourceSpec::Joined {
                delays: PathBuf::from("Airline_Delay_Cause.csv"),
                airports: PathBuf::from("airports.csv"),
            },
            preview_rows: 100,
            top_n: 10,
        }
    }
}

impl From<Cli> for DashboardConfig {
    fn from(cli: Cli) -> Self {
        let source = match cli.merged {
            Some(path) => SourceSpec::Merged { path },
            None => SourceSpec::Joined {
                delays: cli.delays,
                airports: cli.airports,
            },
        };
        DashboardConfig {
            source,
            preview_rows: cli.preview_rows,
            top_n: cli.top_n,
        }
    }
}
