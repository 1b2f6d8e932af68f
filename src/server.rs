use std::net::SocketAddr;

use tokio::{
    net::{TcpListener, TcpSocket, TcpStream},
    sync::watch,
    task::{JoinError, JoinSet},
};

use crate::{client, lottery::SharedLottery};

/// Binds a listening socket with the given accept backlog
pub fn bind(addr: SocketAddr, backlog: u32) -> tokio::io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    socket.listen(backlog)
}

/// Accepts agencies until a shutdown is requested, each served by its own task
///
/// once the shutdown is observed the listener is closed and the sessions that are
/// still in flight are allowed to run to completion.
/// only a failure to accept ends the loop early.
pub async fn serve(
    listener: TcpListener,
    lottery: SharedLottery,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::io::Result<()> {
    tracing::info!("server is listening on: {}", listener.local_addr()?);

    let mut sessions = JoinSet::new();
    // stops watching once nobody is able to request a shutdown anymore
    let mut watching = true;

    let result = loop {
        if *shutdown.borrow() {
            break Ok(());
        }

        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::error!(action = "accept_connection", result = "fail", error = %err);
                        break Err(err);
                    }
                };

                tracing::info!(action = "accept_connection", result = "success", ip = %addr.ip());
                sessions.spawn(session(stream, addr, lottery.clone()));
            }
            // reap finished sessions as we go
            Some(result) = sessions.join_next(), if !sessions.is_empty() => reap(result),
            changed = shutdown.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                }
            }
        }
    };

    drop(listener);
    tracing::info!(action = "shutdown", result = "in_progress", sessions = sessions.len());
    while let Some(result) = sessions.join_next().await {
        reap(result);
    }
    tracing::info!(action = "shutdown", result = "success");

    result
}

fn reap(result: Result<(), JoinError>) {
    if let Err(err) = result {
        tracing::error!("a session task failed: {}", err);
    }
}

async fn session(stream: TcpStream, addr: SocketAddr, lottery: SharedLottery) {
    match client::handle(stream, lottery).await {
        Ok(()) => tracing::debug!(action = "close_connection", result = "success", ip = %addr.ip()),
        Err(err) => tracing::warn!(
            action = "close_connection",
            result = "fail",
            ip = %addr.ip(),
            error = %err
        ),
    }
}
