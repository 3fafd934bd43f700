use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-energy microgrid dispatch", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the receding-horizon dispatch and write the schedule as CSV
    Run {
        /// Plant descriptor (JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        plant: PathBuf,
        /// Forecast table (CSV, timestamp column first)
        #[arg(long, value_hint = ValueHint::FilePath)]
        forecast: PathBuf,
        /// Run configuration (TOML); defaults apply when omitted
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// First horizon start, `YYYY-MM-DD HH:MM:SS`; defaults to the first forecast row
        #[arg(long)]
        start: Option<String>,
        /// Number of horizons; overrides the configuration
        #[arg(long)]
        horizons: Option<usize>,
        /// Schedule output
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Write the run summary as JSON
        #[arg(long, value_hint = ValueHint::FilePath)]
        summary: Option<PathBuf>,
    },
    /// Show prepared components, network size and islands
    Inspect {
        #[arg(long, value_hint = ValueHint::FilePath)]
        plant: PathBuf,
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
    },
    /// Print the fitted efficiency segments of one component
    Fit {
        #[arg(long, value_hint = ValueHint::FilePath)]
        plant: PathBuf,
        /// Component name
        #[arg(long)]
        component: String,
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
    },
}
