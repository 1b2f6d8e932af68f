use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::lottery::rule::DEFAULT_WINNING_NUMBER;

/// Collects the bets of every agency and draws the lottery once all of them are done
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct ServerConfig {
    /// Port to listen on, on every interface
    #[arg(long, env = "SERVER_PORT", default_value_t = 12345)]
    pub port: u16,

    /// Maximum number of pending connections
    #[arg(long, env = "SERVER_LISTEN_BACKLOG", default_value_t = 5)]
    pub listen_backlog: u32,

    /// Number of agencies that must finish before the draw
    #[arg(
        long,
        env = "AGENCIES",
        default_value_t = 5,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub agencies: u16,

    /// File the bets are stored in
    #[arg(long, env = "STORAGE_FILEPATH", default_value = "./bets.csv")]
    pub storage: PathBuf,

    /// The number that wins the draw
    #[arg(long, env = "LOTTERY_WINNER_NUMBER", default_value_t = DEFAULT_WINNING_NUMBER)]
    pub winning_number: u32,

    /// Log filter, a level (trace, debug, info, warn, error) or a list of directives
    #[arg(long, env = "LOGGING_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Submits the bets of a single agency and asks for its winners
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct AgencyConfig {
    /// The agency number
    #[arg(long, env = "CLI_ID")]
    pub id: u32,

    /// Address of the lottery server
    #[arg(long, env = "CLI_SERVER_ADDRESS", default_value = "server:12345")]
    pub server_address: String,

    /// File with one `first_name,last_name,document,birthdate,number` bet per line
    #[arg(long, env = "CLI_BETS_FILE", default_value = "./agency.csv")]
    pub bets_file: PathBuf,

    /// Maximum number of bets in a single batch
    #[arg(
        long,
        env = "CLI_BATCH_MAXAMOUNT",
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub batch_max_amount: u32,

    /// Time to wait before asking again for winners that weren't drawn yet
    #[arg(long, env = "CLI_QUERY_INTERVAL_MS", default_value_t = 500)]
    pub query_interval_ms: u64,

    /// Log filter, a level (trace, debug, info, warn, error) or a list of directives
    #[arg(long, env = "LOGGING_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl AgencyConfig {
    pub fn query_interval(&self) -> Duration {
        Duration::from_millis(self.query_interval_ms)
    }
}

/// Connects tracing to stdout, filtered by the configured level
pub fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install the tracing subscriber: {}", err))
}
