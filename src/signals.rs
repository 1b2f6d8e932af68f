use tokio::sync::watch;

/// Waits until the process is asked to terminate
pub async fn terminated() -> tokio::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!(action = "receive_signal", result = "success", signal = "SIGINT"),
            _ = sigterm.recv() => tracing::info!(action = "receive_signal", result = "success", signal = "SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!(action = "receive_signal", result = "success", signal = "ctrl-c");
    }

    Ok(())
}

/// Returns a channel that flips to `true` once the process is asked to terminate
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match terminated().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(err) => {
                tracing::error!("failed to listen for termination signals: {}", err);
            }
        }
    });

    rx
}
