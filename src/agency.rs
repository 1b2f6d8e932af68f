use std::{path::Path, time::Duration};

use anyhow::{bail, Context};
use tokio::net::TcpStream;

use crate::{
    config::AgencyConfig,
    lottery::bet::Bet,
    protocol::{
        batch::Batch,
        connection::Connection,
        message::{Request, Response},
    },
};

/// Batches are kept well below the biggest payload a frame can carry
pub const MAX_BATCH_BYTES: usize = 8 * 1024;

// the query interval doubles on every "not ready" answer, up to this factor
const MAX_BACKOFF_FACTOR: u32 = 8;

/// Runs the whole life of an agency: submit, notify, then wait for the winners
///
/// returns the documents of the winning bets of this agency
pub async fn run(config: &AgencyConfig) -> anyhow::Result<Vec<String>> {
    let bets = load_bets(&config.bets_file, config.id).await?;
    tracing::info!(
        action = "load_bets",
        result = "success",
        agency = config.id,
        count = bets.len()
    );

    let batches = into_batches(bets, config.batch_max_amount as usize, MAX_BATCH_BYTES);
    submit(&config.server_address, batches).await?;
    notify_finished(&config.server_address, config.id).await?;

    let winners = query_winners(&config.server_address, config.id, config.query_interval()).await?;
    tracing::info!(
        action = "query_winners",
        result = "success",
        agency = config.id,
        winners = winners.len()
    );

    Ok(winners)
}

/// Reads a bets file, one `first_name,last_name,document,birthdate,number` bet per line
pub async fn load_bets(path: &Path, agency: u32) -> anyhow::Result<Vec<Bet>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read bets from {}", path.display()))?;

    let agency = agency.to_string();
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let fields: Vec<&str> = line.split(',').collect();
            let [first_name, last_name, document, birthdate, number] = fields[..] else {
                bail!(
                    "line {} of {}: expected 5 fields, found {}",
                    index + 1,
                    path.display(),
                    fields.len()
                );
            };

            Bet::new(&agency, first_name, last_name, document, birthdate, number)
                .with_context(|| format!("line {} of {}", index + 1, path.display()))
        })
        .collect()
}

/// Splits the bets into batches of at most `max_amount` bets and `max_bytes` bytes
///
/// the last batch is always marked as such, no bets at all still makes a single empty batch
pub fn into_batches(bets: Vec<Bet>, max_amount: usize, max_bytes: usize) -> Vec<Batch> {
    let max_amount = max_amount.max(1);

    let mut batches = vec![];
    let mut current = Batch {
        bets: vec![],
        is_last: false,
    };
    // room for the header line, with a count and the eof marker
    let header_len = "9999|EOF\n".len();
    let mut current_len = header_len;

    for bet in bets {
        let line_len = bet.to_string().len() + 1;
        let is_full = current.bets.len() >= max_amount || current_len + line_len > max_bytes;
        if is_full && !current.bets.is_empty() {
            batches.push(std::mem::replace(
                &mut current,
                Batch {
                    bets: vec![],
                    is_last: false,
                },
            ));
            current_len = header_len;
        }

        current_len += line_len;
        current.bets.push(bet);
    }

    current.is_last = true;
    batches.push(current);

    batches
}

/// Sends every batch over a single connection
pub async fn submit(address: &str, batches: Vec<Batch>) -> anyhow::Result<()> {
    let mut connection = connect(address).await?;

    for batch in batches {
        let sent = batch.bets.len();
        let response = connection
            .request(&Request::Batch(batch))
            .await
            .context("failed to send a batch")?;

        match response {
            Response::BatchAck { count, .. } if count == sent => {
                tracing::info!(action = "send_batch", result = "success", count)
            }
            Response::InternalError { .. } => {
                tracing::error!(action = "send_batch", result = "fail", count = sent)
            }
            response => bail!("unexpected response to a batch: {}", response),
        }
    }

    Ok(())
}

/// Tells the server this agency won't send any more bets
pub async fn notify_finished(address: &str, agency: u32) -> anyhow::Result<()> {
    let mut connection = connect(address).await?;

    match connection.request(&Request::Finished { agency }).await? {
        Response::FinishedAck => {
            tracing::info!(action = "notify_finished", result = "success", agency);
            Ok(())
        }
        response => bail!("unexpected response to finished: {}", response),
    }
}

/// Asks for the winners of this agency until the draw has run
pub async fn query_winners(
    address: &str,
    agency: u32,
    interval: Duration,
) -> anyhow::Result<Vec<String>> {
    let mut attempt = 0;

    loop {
        let mut connection = connect(address).await?;

        match connection.request(&Request::QueryWinners { agency }).await? {
            Response::Winners {
                agency: winner_agency,
                documents,
            } if winner_agency == agency => return Ok(documents),
            Response::NotReady => {
                tracing::debug!(action = "query_winners", result = "in_progress", agency);
                tokio::time::sleep(query_delay(interval, attempt)).await;
                attempt = attempt.saturating_add(1);
            }
            response => bail!("unexpected response to a winners query: {}", response),
        }
    }
}

// doubles the interval on every attempt, up to MAX_BACKOFF_FACTOR times
fn query_delay(interval: Duration, attempt: u32) -> Duration {
    let factor = 1u32
        .checked_shl(attempt)
        .unwrap_or(u32::MAX)
        .min(MAX_BACKOFF_FACTOR);

    interval.saturating_mul(factor)
}

async fn connect(address: &str) -> anyhow::Result<Connection<TcpStream>> {
    let stream = TcpStream::connect(address)
        .await
        .with_context(|| format!("failed to connect to {}", address))?;

    Ok(Connection::new(stream))
}
