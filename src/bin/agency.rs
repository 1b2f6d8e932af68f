use clap::Parser;
use lottery_service::{
    agency,
    config::{self, AgencyConfig},
    signals,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgencyConfig::parse();
    config::init_tracing(&config.log_level)?;

    // stop at whatever step we're in once asked to terminate
    tokio::select! {
        result = agency::run(&config) => {
            result?;
        }
        result = signals::terminated() => {
            result?;
            tracing::info!(action = "shutdown", result = "success", agency = config.id);
        }
    }

    Ok(())
}
