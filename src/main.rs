use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use lottery_service::{
    config::{self, ServerConfig},
    lottery::{rule::WinningNumber, store::CsvFileStore, Lottery},
    server, signals,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    config::init_tracing(&config.log_level)?;
    tracing::debug!("loaded configuration: {:?}", config);

    let store = CsvFileStore::new(&config.storage);
    tracing::info!("storing bets in: {}", store.path().display());

    let lottery = Lottery::new(
        store,
        WinningNumber(config.winning_number),
        config.agencies.into(),
    )
    .shared();
    tracing::info!("waiting for {} agencies before the draw", lottery.agencies());

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = server::bind(addr, config.listen_backlog)
        .with_context(|| format!("failed to listen on {}", addr))?;

    let shutdown = signals::shutdown_channel();
    server::serve(listener, lottery, shutdown).await?;

    Ok(())
}
