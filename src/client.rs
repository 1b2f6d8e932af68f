use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    lottery::{Finished, SharedLottery},
    protocol::{
        batch::Batch,
        connection::Connection,
        message::{Request, Response},
    },
};

// what to do with the session after responding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Session {
    Continue,
    Close,
}

/// Serves a single agency until its session ends
///
/// requests are handled one at a time, in the order they arrive.
/// the session ends when the agency closes the connection, after a malformed
/// request, or once a `FINISHED` / `QUERY_WINNERS` request has been answered.
pub async fn handle<S>(stream: S, lottery: SharedLottery) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut connection = Connection::new(stream);

    while let Some(request) = connection.read_request().await? {
        let (response, session) = match request {
            Ok(request) => {
                tracing::debug!("received request: {:?}", request);
                dispatch(request, &lottery).await
            }
            Err(err) => {
                tracing::warn!(action = "parse_request", result = "fail", error = %err);
                (Response::FormatError, Session::Close)
            }
        };

        tracing::debug!("responded: {}", response);
        connection.send_response(&response).await?;

        if session == Session::Close {
            break;
        }
    }

    Ok(())
}

async fn dispatch(request: Request, lottery: &SharedLottery) -> (Response, Session) {
    match request {
        Request::Batch(batch) => (store_batch(batch, lottery).await, Session::Continue),
        Request::Finished { agency } => (finish(agency, lottery).await, Session::Close),
        Request::QueryWinners { agency } => {
            (query_winners(agency, lottery).await, Session::Close)
        }
    }
}

async fn store_batch(Batch { bets, is_last }: Batch, lottery: &SharedLottery) -> Response {
    match lottery.store_batch(&bets).await {
        Ok(count) => {
            tracing::info!(
                action = "bets_received",
                result = "success",
                count,
                last = is_last
            );
            Response::BatchAck { count, is_last }
        }
        Err(err) => {
            tracing::error!(
                action = "bets_received",
                result = "fail",
                count = bets.len(),
                error = %err
            );
            Response::InternalError { is_last }
        }
    }
}

async fn finish(agency: u32, lottery: &SharedLottery) -> Response {
    match lottery.notify_finished(agency).await {
        Ok(finished) => {
            match finished {
                Finished::Waiting { remaining } => tracing::info!(
                    action = "agency_finished",
                    result = "success",
                    agency,
                    remaining
                ),
                Finished::Drawn | Finished::AlreadyDrawn => {
                    tracing::info!(action = "agency_finished", result = "success", agency)
                }
            }
            Response::FinishedAck
        }
        Err(err) => {
            tracing::error!(action = "draw", result = "fail", agency, error = %err);
            Response::InternalError { is_last: false }
        }
    }
}

async fn query_winners(agency: u32, lottery: &SharedLottery) -> Response {
    match lottery.winners(agency).await {
        Some(documents) => {
            tracing::info!(
                action = "query_winners",
                result = "success",
                agency,
                winners = documents.len()
            );
            Response::Winners { agency, documents }
        }
        None => {
            tracing::debug!(action = "query_winners", result = "in_progress", agency);
            Response::NotReady
        }
    }
}
